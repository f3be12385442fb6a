//! Render command - Render one view to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tracing::info;

use vista_core::{RequestMeta, ResponseMeta, ViewEngine, ViewRequest};

use super::RootArgs;
use crate::ExitCodes;

#[derive(Args)]
pub struct RenderArgs {
    /// View to render, relative to the root
    pub view: String,

    #[command(flatten)]
    pub root: RootArgs,

    /// Locals as a JSON object
    #[arg(short, long)]
    pub locals: Option<String>,

    /// Layout to use instead of the configured one
    #[arg(long, conflicts_with = "no_layout")]
    pub layout: Option<String>,

    /// Render the view without a layout
    #[arg(long)]
    pub no_layout: bool,

    /// Disable the compiled-view cache
    #[arg(long)]
    pub no_cache: bool,

    /// Content type to report, e.g. text/xml
    #[arg(long)]
    pub content_type: Option<String>,

    /// Request URL exposed to helpers
    #[arg(long, default_value = "/")]
    pub url: String,
}

impl RenderArgs {
    fn request(&self) -> Result<ViewRequest> {
        let locals = match &self.locals {
            Some(text) => {
                let value: Value =
                    serde_json::from_str(text).context("Invalid --locals JSON")?;
                if !value.is_object() {
                    anyhow::bail!("--locals must be a JSON object");
                }
                value
            }
            None => Value::Object(Default::default()),
        };

        let mut request = ViewRequest::from_locals(&self.view, locals);
        if self.no_layout {
            request = request.no_layout();
        } else if let Some(layout) = &self.layout {
            request = request.layout(layout.as_str());
        }
        Ok(request)
    }
}

pub async fn execute(args: RenderArgs) -> Result<u8> {
    let mut config = args.root.load()?;
    if args.no_cache {
        config = config.cache(false);
    }
    let request = args.request()?;
    info!("Rendering {} from {:?}", request.view, config.root);

    let engine = ViewEngine::new(config);
    let mut response_meta = ResponseMeta::new();
    if let Some(content_type) = &args.content_type {
        response_meta = response_meta.content_type(content_type.as_str());
    }
    let response = engine
        .respond(&request, &RequestMeta::new("GET", args.url.as_str()), &response_meta)
        .await;

    if !response.is_success() {
        eprintln!("{}", response.body);
        return Ok(ExitCodes::RENDER_FAILURE);
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(response.body.as_bytes())?;
    stdout.flush()?;
    Ok(ExitCodes::SUCCESS)
}
