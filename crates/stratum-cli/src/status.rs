use stratum_config::AppConfig;
use stratum_migrate::StatusReport;

const MIN_WIDTH: usize = 60;

/// Print the status box for `report`.
pub fn print_status(report: &StatusReport, config: &AppConfig) {
    println!("{}", render_status(report, config));
}

/// Render a boxed summary: database, current version, then one line per
/// catalog migration with its applied mark.
pub fn render_status(report: &StatusReport, config: &AppConfig) -> String {
    let version = env!("CARGO_PKG_VERSION");

    let mut body = vec![
        format!("Database    {}", config.database.path.display()),
        format!("Migrations  {}", config.migrations.dir.display()),
        format!(
            "Current     {}",
            if report.current.is_zero() {
                "none".to_string()
            } else {
                report.current.to_string()
            }
        ),
        format!(
            "Pending     {} of {}",
            report.pending(),
            report.migrations.len()
        ),
        String::new(),
    ];

    if report.migrations.is_empty() {
        body.push("no migrations found".to_string());
    }
    for migration in &report.migrations {
        let mark = if migration.applied { "x" } else { " " };
        body.push(format!("[{mark}] {}", migration.name));
    }
    if !report.orphaned.is_empty() {
        body.push(String::new());
        body.push("Applied but missing from catalog:".to_string());
        for version in &report.orphaned {
            body.push(format!("[!] {version}"));
        }
    }

    // Layout
    let inner = body
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_WIDTH - 4);
    let width = inner + 4;

    let title = format!("Stratum v{version}");
    let title_dashes = width.saturating_sub(title.chars().count() + 7);
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));
    let row = |text: &str| format!("│ {text:<inner$} │");

    let mut out = vec![top, row("")];
    out.extend(body.iter().map(|line| row(line)));
    out.push(row(""));
    out.push(bottom);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_migrate::MigrationStatus;

    fn report() -> StatusReport {
        StatusReport {
            current: "20240101000000".parse().unwrap(),
            migrations: vec![
                MigrationStatus {
                    version: "20240101000000".parse().unwrap(),
                    name: "20240101000000_create_users".to_string(),
                    applied: true,
                },
                MigrationStatus {
                    version: "20240102000000".parse().unwrap(),
                    name: "20240102000000_add_email".to_string(),
                    applied: false,
                },
            ],
            orphaned: vec!["7".parse().unwrap()],
        }
    }

    #[test]
    fn marks_applied_and_pending_migrations() {
        let out = render_status(&report(), &AppConfig::default());
        assert!(out.contains("[x] 20240101000000_create_users"));
        assert!(out.contains("[ ] 20240102000000_add_email"));
        assert!(out.contains("Pending     1 of 2"));
        assert!(out.contains("[!] 7"));
    }

    #[test]
    fn rows_share_one_width() {
        let out = render_status(&report(), &AppConfig::default());
        let widths: Vec<usize> = out.lines().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|w| *w == widths[0]), "{widths:?}");
    }

    #[test]
    fn empty_database_shows_none() {
        let report = StatusReport {
            current: "0".parse().unwrap(),
            migrations: Vec::new(),
            orphaned: Vec::new(),
        };
        let out = render_status(&report, &AppConfig::default());
        assert!(out.contains("Current     none"));
        assert!(out.contains("no migrations found"));
    }
}
