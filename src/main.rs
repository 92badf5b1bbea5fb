//! apputil: demo greeter built on the apputil library.
//!
//! Every flag falls back to configuration: built-in defaults, then the user
//! file, then `APPUTIL_*` environment variables.

use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use apputil::{
    AppRunner, ArgumentResolver, ArgumentSpec, Args, ConfigLayer, MergedConfig, Shutdown, TypeSpec,
};

const APP_NAME: &str = "apputil";

fn main() -> Result<()> {
    let config = ConfigLayer::new(APP_NAME)
        .defaults(&json!({
            "env_config_prefix": "APPUTIL_",
            "user_config": "userconfig.yml",
            "greeting": "Hello",
            "count": 1,
            "timeout": 30,
            "mode": "plain",
        }))?
        .build()?;

    let resolver = ArgumentResolver::new(APP_NAME, &config)
        .about("Print a greeting, configured from flags, environment, or a user file")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            ArgumentSpec::new("name", TypeSpec::non_empty_string())
                .short('n')
                .help("Who to greet"),
        )
        .arg(
            ArgumentSpec::new("greeting", TypeSpec::non_empty_string())
                .short('g')
                .help("Greeting word"),
        )
        .arg(
            ArgumentSpec::new("count", TypeSpec::positive_nonzero_integer())
                .short('c')
                .help("Number of times to print the greeting"),
        )
        .arg(
            ArgumentSpec::new("timeout", TypeSpec::positive_integer())
                .short('t')
                .value_name("SECONDS")
                .help("Seconds to wait with --wait"),
        )
        .arg(
            ArgumentSpec::new("mode", TypeSpec::selection(["plain", "shout"])).help("Output style"),
        )
        .arg(
            ArgumentSpec::new(
                "tags",
                TypeSpec::optional(TypeSpec::list(TypeSpec::non_empty_string())),
            )
            .help("Comma or space separated tags to append"),
        )
        .arg(ArgumentSpec::switch("wait").help("Wait for a shutdown signal after greeting"))
        .arg(ArgumentSpec::switch("fail").help("Exit with an error after greeting"))
        .arg(
            ArgumentSpec::switch("show_config").help("Print the effective configuration and exit"),
        );

    AppRunner::new(APP_NAME)
        .run_cli(&resolver, |args, shutdown| greet(args, shutdown, &config))
        .exit()
}

fn greet(args: &Args, shutdown: &Shutdown, config: &MergedConfig) -> Result<()> {
    if args.get_bool("show_config") == Some(true) {
        println!("{}", serde_json::to_string_pretty(&config.to_json_with_sources())?);
        return Ok(());
    }

    let line = render_greeting(args)?;
    for _ in 0..args.value::<u64>("count")? {
        println!("{line}");
    }

    if args.get_bool("fail") == Some(true) {
        anyhow::bail!("failure requested with --fail");
    }

    if args.get_bool("wait") == Some(true) {
        let timeout = Duration::from_secs(args.value::<u64>("timeout")?);
        info!("Waiting for shutdown signal");
        if !shutdown.wait_timeout(timeout) {
            info!("No shutdown signal after {}s", timeout.as_secs());
        }
    }

    Ok(())
}

fn render_greeting(args: &Args) -> Result<String> {
    let mut line = format!(
        "{}, {}!",
        args.value::<String>("greeting")?,
        args.value::<String>("name")?
    );
    if let Some(tags) = args.value::<Option<Vec<String>>>("tags")? {
        line.push_str(&format!(" [{}]", tags.join(", ")));
    }
    if args.get_str("mode") == Some("shout") {
        line = line.to_uppercase();
    }
    Ok(line)
}
