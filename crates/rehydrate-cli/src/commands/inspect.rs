use anyhow::{Result, anyhow};
use rehydrate_core::AppConfig;
use rehydrate_pipeline::{build_simplified_text, parse_structured};
use serde_json::{Map, Value, json};
use std::fs;
use std::io::{Read, stdin};
use std::path::Path;

use crate::InspectResultArgs;
use crate::output::print_json;

pub(crate) fn run_inspect_result(cwd: &Path, args: InspectResultArgs, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::load(cwd)?;
    let raw = read_source(&args.source)?;
    let raw = raw.trim_end_matches(['\n', '\r']);
    let tool_args = parse_tool_args(args.args.as_deref())?;

    let parsed = parse_structured(raw);
    let simplified = if args.error {
        build_simplified_text(&tool_args, None, Some(raw), cfg.display.wrap_column)
    } else {
        build_simplified_text(&tool_args, Some(raw), None, cfg.display.wrap_column)
    };

    if json_mode {
        print_json(&json!({
            "parsed": parsed,
            "simplified_text": simplified,
        }))?;
        return Ok(());
    }

    match &parsed {
        Some(result) => {
            println!("command: {}", result.command.as_deref().unwrap_or("-"));
            println!("title:   {}", result.title.as_deref().unwrap_or("-"));
            println!("output:  {}", result.output.as_deref().unwrap_or("-"));
        }
        None => println!("no structured fields recovered"),
    }
    if let Some(text) = simplified {
        println!("---");
        println!("{text}");
    }
    Ok(())
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    Ok(fs::read_to_string(source)?)
}

fn parse_tool_args(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("--args must be a JSON object")),
    }
}
