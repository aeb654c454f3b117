fn main() {
    let Some(options) = handle_cli_flags() else {
        return;
    };

    if let Err(err) = bsky_tui::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Returns `None` when a flag was fully handled and the UI should not start.
fn handle_cli_flags() -> Option<bsky_tui::RunOptions> {
    let mut options = bsky_tui::RunOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("bsky-tui {}", bsky_tui::VERSION);
                return None;
            }
            "--help" | "-h" => {
                println!(
                    "bsky-tui - Read your Bluesky timeline from the terminal.\n\n  --demo               Browse a built-in offline feed\n  --logout             Forget the stored session and exit\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n\nEnvironment: BSKY_SERVICE, BSKY_HANDLE, BSKY_PASSWORD, BSKY_TUI_LOG"
                );
                return None;
            }
            "--logout" => {
                if let Err(err) = bsky_tui::app::logout() {
                    eprintln!("Logout failed: {err:?}");
                    std::process::exit(1);
                }
                return None;
            }
            "--demo" => options.demo = true,
            other => {
                eprintln!("unknown argument: {other}\nRun with --help for usage.");
                std::process::exit(2);
            }
        }
    }
    Some(options)
}
