use tasklane_config::AppConfig;

/// Print the start banner for `operation` with the database and migration source.
pub fn print_banner(operation: &str, config: &AppConfig, source: &str) {
    let version = env!("CARGO_PKG_VERSION");

    let database = config.database_path().to_string_lossy().to_string();
    let database = match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => database.replace(&home, "~"),
        _ => database,
    };

    let rows = [
        ("Operation", operation.to_string()),
        ("Environment", config.environment.to_string()),
        ("Database", database),
        ("Migrations", source.to_string()),
    ];

    let label_w = 12;
    let width = rows
        .iter()
        .map(|(_, value)| value.chars().count() + label_w + 4)
        .max()
        .unwrap_or(0)
        .max(48);

    let title = format!("tasklane v{version}");
    let title_dashes = width.saturating_sub(title.chars().count() + 7);
    println!("╭─── {title} {}╮", "─".repeat(title_dashes));
    for (label, value) in &rows {
        let value_w = width - label_w - 4;
        println!("│ {label:<label_w$}{value:<value_w$} │");
    }
    println!("╰{}╯", "─".repeat(width - 2));
}
