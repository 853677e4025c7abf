// Copyright 2020 TwoCookingMice

use yafcore::core::error::RenderResult;
use yafcore::core::scene_loader::load_scene;
use yafcore::core::settings::{OutputMethod, Threads};
use yafcore::integrators::build_integrator;
use yafcore::io::sink::{ImageFileSink, XmlExportSink};
use yafcore::renderers::scheduler::RenderStatus;
use yafcore::renderers::tiled::{Renderer, TiledRenderer};

use console::style;
use std::env;
use std::str::FromStr;
use std::time::Instant;

#[derive(Debug, Default, PartialEq)]
struct Overrides {
    threads: Option<usize>,
    seed: Option<u64>,
    passes: Option<u32>,
}

fn parse_value<T: FromStr>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{} expects a value", flag))?;
    value.parse::<T>().map_err(|_| format!("invalid value '{}' for {}", value, flag))
}

fn parse_positive<T: FromStr + PartialEq + Default>(flag: &str, value: Option<&String>) -> Result<T, String> {
    let parsed = parse_value::<T>(flag, value)?;
    if parsed == T::default() {
        return Err(format!("{} must be at least 1", flag));
    }
    Ok(parsed)
}

fn parse_overrides(args: &[String]) -> Result<Overrides, String> {
    let mut overrides = Overrides::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--threads" => {
                i += 1;
                overrides.threads = Some(parse_positive("--threads", args.get(i))?);
            }
            "--seed" => {
                i += 1;
                overrides.seed = Some(parse_value("--seed", args.get(i))?);
            }
            "--passes" => {
                i += 1;
                overrides.passes = Some(parse_positive("--passes", args.get(i))?);
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
        i += 1;
    }
    Ok(overrides)
}

fn run(input_path: &str, output_path: &str, overrides: &Overrides) -> RenderResult<()> {
    let mut description = load_scene(input_path)?;
    log::set_max_level(description.settings.log_level());
    if let Some(n) = overrides.threads {
        description.settings.threads = Threads::Fixed(n);
    }
    if let Some(seed) = overrides.seed {
        description.settings.seed = seed;
    }
    if let Some(passes) = overrides.passes {
        description.aa.passes = passes;
    }

    if description.settings.output.method == OutputMethod::Xml {
        XmlExportSink::new(description.properties.clone(), output_path).export()?;
        println!("{} {}", style("Exported").green().bold(), output_path);
        return Ok(());
    }
    if description.settings.output.method == OutputMethod::IntoHost {
        log::warn!("No host framebuffer attached, writing image files instead.");
    }

    let start = Instant::now();
    let integrator = build_integrator(&description.integrator, &description.settings, &description.passes);
    let mut renderer = TiledRenderer::new(integrator, description.settings.clone(), description.aa,
                                          description.noise, description.passes.clone());
    let mut sink = ImageFileSink::new(output_path);
    let status = renderer.render(&description.scene, &mut sink)?;
    let label = match description.settings.custom_string.as_str() {
        "" => String::new(),
        custom => format!(" [{}]", custom),
    };

    match status {
        RenderStatus::Completed => println!(
            "{} {}{} in {:.2?}: {}",
            style("Rendered").green().bold(),
            input_path,
            label,
            start.elapsed(),
            sink.written().join(", ")
        ),
        RenderStatus::Aborted => println!("{} {}{}", style("Aborted").yellow().bold(), input_path, label),
    }
    Ok(())
}

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <scene.xml> <output> [--threads N] [--seed N] [--passes N]", args[0]);
        std::process::exit(1);
    }

    let overrides = match parse_overrides(&args[3..]) {
        Ok(overrides) => overrides,
        Err(message) => {
            eprintln!("{} {}", style("error:").red().bold(), message);
            eprintln!("Usage: {} <scene.xml> <output> [--threads N] [--seed N] [--passes N]", args[0]);
            std::process::exit(1);
        }
    };
    if let Err(err) = run(&args[1], &args[2], &overrides) {
        eprintln!("{} {}", style("error:").red().bold(), err);
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_overrides_parsed() {
        let overrides = parse_overrides(&args(&["--threads", "4", "--seed", "9", "--passes", "2"])).unwrap();
        assert_eq!(overrides, Overrides { threads: Some(4), seed: Some(9), passes: Some(2) });
        assert_eq!(parse_overrides(&[]).unwrap(), Overrides::default());
    }

    #[test]
    fn test_bad_overrides_rejected() {
        assert!(parse_overrides(&args(&["--threads", "abc"])).is_err());
        assert!(parse_overrides(&args(&["--threads", "0"])).is_err());
        assert!(parse_overrides(&args(&["--passes", "x"])).is_err());
        assert!(parse_overrides(&args(&["--passes", "0"])).is_err());
        assert!(parse_overrides(&args(&["--seed"])).is_err());
        assert!(parse_overrides(&args(&["--fast"])).is_err());
        assert_eq!(parse_overrides(&args(&["--seed", "0"])).unwrap().seed, Some(0));
    }
}
