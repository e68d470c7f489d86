use std::{env, env::VarError};

/// The server takes no arguments. Passing any prints the help text and the current environment.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Passwords, tokens and API keys are left off this list
    const DISPLAY_ENVS: [&str; 21] = [
        "RUST_LOG",
        "CHECKOUT_HOST",
        "CHECKOUT_PORT",
        "CHECKOUT_CORS_ALLOWED_ORIGINS",
        "CHECKOUT_DATABASE_URL",
        "CHECKOUT_RESET_ORDERS_ON_START",
        "CHECKOUT_MURAL_BASE_URL",
        "CHECKOUT_MURAL_ACCOUNT_ID",
        "CHECKOUT_MURAL_TIMEOUT_SECS",
        "CHECKOUT_USE_WEBHOOKS",
        "CHECKOUT_BACKEND_BASE_URL",
        "CHECKOUT_MOCK_USDC_ADDRESS",
        "CHECKOUT_MOCK_NETWORK",
        "CHECKOUT_POLL_INTERVAL_SECS",
        "CHECKOUT_WATCH_WINDOW_SECS",
        "CHECKOUT_ASSUME_PAID_ON_TIMEOUT",
        "CHECKOUT_MATCH_TOLERANCE_MICRO_USDC",
        "CHECKOUT_FALLBACK_COP_RATE",
        "CHECKOUT_TOKEN_SYMBOL",
        "CHECKOUT_LIFECYCLE_WORKERS",
        "CHECKOUT_LIFECYCLE_QUEUE_CAPACITY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<40} {val:<15}");
    })
}
