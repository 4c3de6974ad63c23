//! Route command - Show which route a prompt takes.

use anyhow::Result;
use clap::Args;

use rmm_core::{Route, Router};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Prompt text to classify
    pub prompt: String,

    /// Print the decision as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RouteArgs) -> Result<()> {
    let decision = Router::default().explain(&args.prompt);

    if args.json {
        let value = serde_json::json!({
            "routed_to": decision.route,
            "matched_keyword": decision.matched_keyword,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match (decision.route, decision.matched_keyword) {
        (Route::Incident, Some(keyword)) => {
            println!("🚨 {} (matched keyword \"{}\")", decision.route, keyword)
        }
        (route, _) => println!("💬 {} (no incident keyword matched)", route),
    }
    Ok(())
}
