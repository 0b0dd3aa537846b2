use anyhow::Result;
use rehydrate_pipeline::decode;
use serde_json::json;

use crate::DecodeArgs;
use crate::output::print_json;

pub(crate) fn run_decode(args: DecodeArgs, json_mode: bool) -> Result<()> {
    let decoded = decode(&args.text);
    if json_mode {
        print_json(&json!({ "decoded": decoded }))?;
    } else {
        println!("{decoded}");
    }
    Ok(())
}
