//! Check command - Compile every template under a root.

use anyhow::Result;
use clap::Args;
use tracing::info;

use vista_core::ViewEngine;

use super::RootArgs;
use crate::ExitCodes;

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub root: RootArgs,
}

pub async fn execute(args: CheckArgs) -> Result<u8> {
    let config = args.root.load()?.cache(false);
    let engine = ViewEngine::new(config);
    info!("Checking templates under {:?}", engine.root());

    let total = engine.template_files().len();
    if total == 0 {
        println!("No templates found under {}", engine.root().display());
        return Ok(ExitCodes::SUCCESS);
    }

    let failures = engine.check_all().await;
    for (path, err) in &failures {
        let shown = path.strip_prefix(engine.root()).unwrap_or(path);
        println!("FAIL {}: {}", shown.display(), err.diagnostic());
    }
    println!(
        "{} template(s) checked, {} passed, {} failed",
        total,
        total - failures.len(),
        failures.len()
    );

    if failures.is_empty() {
        Ok(ExitCodes::SUCCESS)
    } else {
        Ok(ExitCodes::CHECK_FAILURE)
    }
}
