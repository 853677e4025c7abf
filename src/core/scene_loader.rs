// Copyright @yucwang 2026

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::bsdf::BSDF;
use crate::core::error::{RenderError, RenderResult};
use crate::core::integrator::IntegratorConfig;
use crate::core::passes::RenderPassSelection;
use crate::core::properties::{parse_property, Properties};
use crate::core::sampling::{AASamplingConfig, NoiseControlConfig};
use crate::core::scene::{Scene, SceneObject};
use crate::core::settings::RenderSettings;
use crate::emitters::point::PointEmitter;
use crate::materials::lambertian_diffuse::LambertianDiffuseBSDF;
use crate::materials::specular::{GlassBSDF, MirrorBSDF};
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::sensors::perspective::PerspectiveCamera;
use crate::shapes::rectangle::Rectangle;
use crate::shapes::sphere::Sphere;

/// Typed property blocks exactly as read from the scene file.
#[derive(Debug, Clone, Default)]
pub struct PropertyBlocks {
    pub render: Properties,
    pub passes: Properties,
    pub noise: Properties,
}

/// Everything needed to start a render.
pub struct SceneDescription {
    pub scene: Scene,
    pub settings: RenderSettings,
    pub integrator: IntegratorConfig,
    pub aa: AASamplingConfig,
    pub noise: NoiseControlConfig,
    pub passes: RenderPassSelection,
    pub properties: PropertyBlocks,
}

pub fn load_scene<P: AsRef<Path>>(path: P) -> RenderResult<SceneDescription> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|e| RenderError::io(path.to_string_lossy(), e))?;
    log::info!("Loading scene: {}.", path.display());
    parse_scene(&xml)
}

pub fn parse_scene(xml: &str) -> RenderResult<SceneDescription> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut parser = DocumentParser::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => parser.open(&tag_name(&e), attributes(&e)?)?,
            Ok(Event::Empty(e)) => {
                let tag = tag_name(&e);
                parser.open(&tag, attributes(&e)?)?;
                parser.close(&tag);
            }
            Ok(Event::End(e)) => parser.close(&String::from_utf8_lossy(e.name().as_ref())),
            Err(e) => {
                return Err(RenderError::config("xml", reader.buffer_position(), e.to_string()));
            }
            _ => {}
        }
        buf.clear();
    }

    build_scene(parser)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Render,
    Passes,
    Noise,
}

/// One scene element with its nested parameters.
#[derive(Debug, Clone)]
struct Element {
    tag: String,
    kind: String,
    attributes: HashMap<String, String>,
    params: Properties,
    points: HashMap<String, Vector3f>,
    to_world: Transform,
    lookat: Option<(Vector3f, Vector3f, Vector3f)>,
    bsdf_ref: Option<String>,
    emitter: Option<Box<Element>>,
}

impl Element {
    fn new(tag: &str, attributes: HashMap<String, String>) -> Self {
        Self {
            tag: tag.to_string(),
            kind: attributes.get("type").cloned().unwrap_or_default(),
            attributes,
            params: Properties::new(),
            points: HashMap::new(),
            to_world: Transform::default(),
            lookat: None,
            bsdf_ref: None,
            emitter: None,
        }
    }

    fn index(&self, name: &str) -> RenderResult<u32> {
        match self.attributes.get(name) {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| RenderError::config(name, raw, "expected a non-negative integer")),
        }
    }

    fn point(&self, name: &str, default: Vector3f) -> Vector3f {
        self.points.get(name).copied().unwrap_or(default)
    }

    fn apply_transform(&mut self, tag: &str, attrs: &HashMap<String, String>) -> RenderResult<()> {
        let component = |key: &str, default: Float| -> RenderResult<Float> {
            attrs.get(key).map(|v| parse_float(key, v)).unwrap_or(Ok(default))
        };
        let step = match tag {
            "translate" => Transform::translate(Vector3f::new(component("x", 0.0)?, component("y", 0.0)?, component("z", 0.0)?)),
            "scale" => match attrs.get("value") {
                Some(v) => Transform::scale(Vector3f::repeat(parse_float("value", v)?)),
                None => Transform::scale(Vector3f::new(component("x", 1.0)?, component("y", 1.0)?, component("z", 1.0)?)),
            },
            "rotate" => Transform::rotate(
                Vector3f::new(component("x", 0.0)?, component("y", 0.0)?, component("z", 0.0)?),
                component("angle", 0.0)?,
            ),
            _ => {
                let origin = parse_vec3("origin", required(attrs, tag, "origin")?)?;
                let target = parse_vec3("target", required(attrs, tag, "target")?)?;
                let up = match attrs.get("up") {
                    Some(v) => parse_vec3("up", v)?,
                    None => Vector3f::new(0.0, 0.0, 1.0),
                };
                self.lookat = Some((origin, target, up));
                return Ok(());
            }
        };
        self.to_world = self.to_world.then(&step);
        Ok(())
    }
}

#[derive(Default)]
struct DocumentParser {
    blocks: PropertyBlocks,
    block: Option<Block>,
    elements: Vec<Element>,
    current: Option<Element>,
    nested: Option<Element>,
}

impl DocumentParser {
    fn element(&mut self) -> Option<&mut Element> {
        match self.nested.as_mut() {
            Some(nested) => Some(nested),
            None => self.current.as_mut(),
        }
    }

    fn open(&mut self, tag: &str, attrs: HashMap<String, String>) -> RenderResult<()> {
        match tag {
            "scene" | "transform" => {}
            "render" => self.block = Some(Block::Render),
            "passes" => self.block = Some(Block::Passes),
            "noise" => self.block = Some(Block::Noise),
            "sensor" | "bsdf" | "shape" | "emitter" | "background" => {
                let element = Element::new(tag, attrs);
                let in_shape = self.current.as_ref().map_or(false, |c| c.tag == "shape");
                if tag == "emitter" && in_shape && self.nested.is_none() {
                    self.nested = Some(element);
                } else if self.current.is_some() || self.block.is_some() {
                    return Err(RenderError::config(tag, &element.kind, "element cannot be nested here"));
                } else {
                    self.current = Some(element);
                }
            }
            "integer" | "float" | "boolean" | "string" | "rgb" => {
                let name = required(&attrs, tag, "name")?;
                let raw = required(&attrs, tag, "value")?;
                let value = parse_property(tag, raw)
                    .ok_or_else(|| RenderError::config(name, raw, format!("invalid {} value", tag)))?;
                let properties = match self.block {
                    Some(Block::Render) => Some(&mut self.blocks.render),
                    Some(Block::Passes) => Some(&mut self.blocks.passes),
                    Some(Block::Noise) => Some(&mut self.blocks.noise),
                    None => self.element().map(|e| &mut e.params),
                };
                match properties {
                    Some(properties) => properties.set(name, value),
                    None => log::warn!("Ignoring property '{}' outside of any element.", name),
                }
            }
            "point" | "vector" => {
                let name = required(&attrs, tag, "name")?.to_string();
                let value = parse_vec3(&name, required(&attrs, tag, "value")?)?;
                if let Some(element) = self.element() {
                    element.points.insert(name, value);
                }
            }
            "translate" | "scale" | "rotate" | "lookat" => {
                if let Some(element) = self.element() {
                    element.apply_transform(tag, &attrs)?;
                }
            }
            "ref" => {
                let id = required(&attrs, tag, "id")?.to_string();
                if let Some(element) = self.element() {
                    element.bsdf_ref = Some(id);
                }
            }
            other => log::warn!("Ignoring unknown scene element <{}>.", other),
        }
        Ok(())
    }

    fn close(&mut self, tag: &str) {
        match tag {
            "render" | "passes" | "noise" => self.block = None,
            "emitter" if self.nested.is_some() => {
                let emitter = self.nested.take().map(Box::new);
                if let Some(shape) = self.current.as_mut() {
                    shape.emitter = emitter;
                }
            }
            "sensor" | "bsdf" | "shape" | "emitter" | "background" => {
                if let Some(element) = self.current.take() {
                    self.elements.push(element);
                }
            }
            _ => {}
        }
    }
}

fn build_scene(parser: DocumentParser) -> RenderResult<SceneDescription> {
    let properties = parser.blocks;
    let settings = RenderSettings::from_properties(&properties.render)?;
    let integrator = IntegratorConfig::from_properties(&properties.render)?;
    let aa = AASamplingConfig::from_properties(&properties.render)?;
    let noise = NoiseControlConfig::from_properties(&properties.noise)?;
    let passes = RenderPassSelection::from_properties(&properties.passes)?;

    let gamma_input = settings.gamma_input;
    let color = |element: &Element, name: &str, default: Float| -> RenderResult<RGBSpectrum> {
        let c = element.params.rgb(name, RGBSpectrum::splat(default), 0.0..=Float::MAX)?;
        Ok(if gamma_input > 0.0 && gamma_input != 1.0 { c.powf(gamma_input) } else { c })
    };

    let mut bsdfs: HashMap<String, Arc<dyn BSDF>> = HashMap::new();
    for element in parser.elements.iter().filter(|e| e.tag == "bsdf") {
        let id = required(&element.attributes, "bsdf", "id")?.to_string();
        let bsdf: Arc<dyn BSDF> = match element.kind.as_str() {
            "diffuse" => Arc::new(LambertianDiffuseBSDF::new(color(element, "reflectance", 0.5)?)),
            "mirror" => Arc::new(MirrorBSDF::new(color(element, "reflectance", 1.0)?)),
            "glass" => Arc::new(GlassBSDF::new(
                element.params.float("ior", 1.5, 1.0..=4.0)?,
                color(element, "reflectance", 1.0)?,
                color(element, "transmittance", 1.0)?,
            )),
            other => return Err(RenderError::config("bsdf", other, "expected diffuse, mirror or glass")),
        };
        bsdfs.insert(id, bsdf);
    }

    let mut scene = Scene::new();
    let mut sensors = 0usize;
    for element in parser.elements.iter().filter(|e| e.tag != "bsdf") {
        match (element.tag.as_str(), element.kind.as_str()) {
            ("sensor", "perspective") => {
                let (origin, target, up) = element
                    .lookat
                    .ok_or_else(|| RenderError::config("sensor", "lookat", "perspective sensor needs a lookat"))?;
                let width = element.params.integer("width", 0, 1..=65536)? as usize;
                let height = element.params.integer("height", 0, 1..=65536)? as usize;
                let fov = element.params.float("fov", 45.0, 1e-3..=179.0)?;
                let camera = PerspectiveCamera::new(
                    origin,
                    target,
                    up,
                    fov.to_radians(),
                    width,
                    height,
                    element.params.float("near_clip", 0.0, 0.0..=Float::MAX)?,
                    element.params.float("far_clip", Float::MAX, 0.0..=Float::MAX)?,
                );
                scene.add_sensor(Box::new(camera));
                sensors += 1;
            }
            ("shape", kind) => {
                let shape: Arc<dyn crate::core::shape::Shape> = match kind {
                    "rectangle" => Arc::new(Rectangle::new(element.to_world)),
                    "sphere" => {
                        let center = element.to_world.apply_point(element.point("center", Vector3f::zeros()));
                        Arc::new(Sphere::new(center, element.params.float("radius", 1.0, 0.0..=Float::MAX)?))
                    }
                    other => return Err(RenderError::config("shape", other, "expected rectangle or sphere")),
                };
                let id = element
                    .bsdf_ref
                    .as_ref()
                    .ok_or_else(|| RenderError::config("shape", kind, "shape needs a bsdf ref"))?;
                let material = bsdfs
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RenderError::config("ref", id, "unknown bsdf id"))?;
                let mut object = SceneObject::new(shape, material)
                    .with_indices(element.index("index")?, element.index("material_index")?);
                if let Some(name) = element.attributes.get("id") {
                    object = object.with_name(name.clone());
                }
                if let Some(emitter) = element.emitter.as_ref() {
                    if emitter.kind != "area" {
                        return Err(RenderError::config("emitter", &emitter.kind, "shapes only carry area emitters"));
                    }
                    object = object.with_emission(color(emitter, "radiance", 1.0)?);
                }
                scene.add_object(object);
            }
            ("emitter", "point") => {
                let position = element.to_world.apply_point(element.point("position", Vector3f::zeros()));
                scene.add_emitter(Arc::new(PointEmitter::new(position, color(element, "intensity", 1.0)?)));
            }
            ("background", _) => scene.set_background(color(element, "color", 0.0)?),
            (tag, kind) => return Err(RenderError::config(tag, kind, "unsupported element type")),
        }
    }

    if sensors == 0 {
        return Err(RenderError::config("sensor", "", "scene needs a perspective sensor"));
    }
    if sensors > 1 {
        log::warn!("Scene has {} sensors, rendering the first one.", sensors);
    }
    if let Some(clay) = settings.clay.as_ref() {
        scene.apply_clay(clay);
    }
    scene.build_bvh()?;
    log::info!("Scene loaded: {} objects, {} emitters.", scene.len(), scene.emitters().len());

    Ok(SceneDescription { scene, settings, integrator, aa, noise, passes, properties })
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn attributes(e: &BytesStart) -> RenderResult<HashMap<String, String>> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| RenderError::config(tag_name(e), "attribute", err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(|err| RenderError::config(&key, "", err.to_string()))?;
        map.insert(key, value.to_string());
    }
    Ok(map)
}

fn required<'a>(attrs: &'a HashMap<String, String>, tag: &str, key: &str) -> RenderResult<&'a str> {
    attrs
        .get(key)
        .map(|v| v.as_str())
        .ok_or_else(|| RenderError::config(tag, key, "missing attribute"))
}

fn parse_float(name: &str, value: &str) -> RenderResult<Float> {
    value
        .trim()
        .parse::<Float>()
        .map_err(|_| RenderError::config(name, value, "invalid float"))
}

fn parse_vec3(name: &str, value: &str) -> RenderResult<Vector3f> {
    let parts: Vec<&str> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 3 {
        return Err(RenderError::config(name, value, "expected three components"));
    }
    Ok(Vector3f::new(parse_float(name, parts[0])?, parse_float(name, parts[1])?, parse_float(name, parts[2])?))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::ErrorCategory;
    use crate::core::passes::{ExternalChannel, PassId};
    use crate::core::settings::{ImageFormat, Threads};

    pub(crate) const BOX_SCENE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<scene>
  <render>
    <boolean name="gs_auto_threads" value="false"/>
    <integer name="gs_threads" value="2"/>
    <integer name="gs_tile_size" value="8"/>
    <string name="gs_tile_order" value="linear"/>
    <string name="img_output" value="OPEN_EXR"/>
    <string name="intg_light_method" value="Pathtracing"/>
    <integer name="intg_path_samples" value="4"/>
    <integer name="AA_passes" value="3"/>
    <float name="AA_threshold" value="0.02"/>
  </render>
  <passes>
    <boolean name="pass_enable" value="true"/>
    <string name="pass_Depth" value="z-depth-abs"/>
  </passes>
  <noise>
    <float name="clamp_samples" value="4"/>
  </noise>
  <sensor type="perspective">
    <lookat origin="0, -6, 3" target="0, 0, 0.5" up="0, 0, 1"/>
    <float name="fov" value="45"/>
    <integer name="width" value="16"/>
    <integer name="height" value="12"/>
  </sensor>
  <bsdf type="diffuse" id="floor">
    <rgb name="reflectance" value="0.7"/>
  </bsdf>
  <bsdf type="glass" id="glass">
    <float name="ior" value="1.5"/>
  </bsdf>
  <shape type="rectangle" id="floor" index="1" material_index="1">
    <transform>
      <scale x="4" y="4" z="1"/>
    </transform>
    <ref id="floor"/>
  </shape>
  <shape type="rectangle" index="2" material_index="2">
    <transform>
      <scale value="0.5"/>
      <rotate x="1" angle="180"/>
      <translate z="4"/>
    </transform>
    <ref id="floor"/>
    <emitter type="area">
      <rgb name="radiance" value="10"/>
    </emitter>
  </shape>
  <shape type="sphere" index="3" material_index="2">
    <point name="center" value="0 0 1.5"/>
    <float name="radius" value="0.5"/>
    <ref id="glass"/>
  </shape>
  <emitter type="point">
    <point name="position" value="0, 0, 2"/>
    <rgb name="intensity" value="4"/>
  </emitter>
  <background>
    <rgb name="color" value="0.5"/>
  </background>
</scene>
"#;

    #[test]
    fn test_load_box_scene() {
        let description = parse_scene(BOX_SCENE).unwrap();
        assert_eq!(description.scene.len(), 3);
        assert_eq!(description.scene.emitters().len(), 2);
        assert!(description.scene.camera(0).is_some());
        assert_eq!(description.scene.objects()[0].name.as_deref(), Some("floor"));
        assert_eq!(description.scene.objects()[2].index, 3);
        assert_eq!(description.scene.objects()[2].material_index, 2);

        assert_eq!(description.settings.threads, Threads::Fixed(2));
        assert_eq!(description.settings.tile_size, 8);
        assert_eq!(description.settings.output.format, ImageFormat::OpenExr);
        assert_eq!(description.integrator.method_name(), "Pathtracing");
        assert_eq!(description.aa.passes, 3);
        assert_eq!(description.noise.clamp_samples, 4.0);
        assert!(description.passes.enabled());
        assert_eq!(description.passes.pass_for(ExternalChannel::Depth), PassId::ZDepthAbs);
        assert!(description.properties.render.contains("gs_threads"));
    }

    #[test]
    fn test_gamma_input_linearizes_colors() {
        let xml = BOX_SCENE.replace(
            "<integer name=\"gs_tile_size\" value=\"8\"/>",
            "<integer name=\"gs_tile_size\" value=\"8\"/><float name=\"gs_gamma_input\" value=\"2\"/>",
        );
        let description = parse_scene(&xml).unwrap();
        let background = description.scene.background(&Vector3f::new(0.0, 0.0, 1.0));
        assert!((background.r() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_bsdf_ref() {
        let xml = BOX_SCENE.replace("<ref id=\"glass\"/>", "<ref id=\"chrome\"/>");
        match parse_scene(&xml) {
            Err(RenderError::Config { parameter, value, .. }) => {
                assert_eq!(parameter, "ref");
                assert_eq!(value, "chrome");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("scene should not load"),
        }
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let bad_value = BOX_SCENE.replace("value=\"0.02\"", "value=\"fast\"");
        match parse_scene(&bad_value) {
            Err(err) => assert_eq!(err.category(), ErrorCategory::Config),
            Ok(_) => panic!("scene should not load"),
        }

        let bad_range = BOX_SCENE.replace("<integer name=\"gs_tile_size\" value=\"8\"/>",
                                          "<integer name=\"gs_tile_size\" value=\"0\"/>");
        assert!(parse_scene(&bad_range).is_err());

        let no_sensor = BOX_SCENE.replace("type=\"perspective\"", "type=\"orthographic\"");
        assert!(parse_scene(&no_sensor).is_err());

        assert!(parse_scene("<scene><render></scene>").is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        match load_scene("/nonexistent/yafcore/scene.xml") {
            Err(err) => assert_eq!(err.category(), ErrorCategory::Io),
            Ok(_) => panic!("scene should not load"),
        }
    }
}
