use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use groupwatch_core::{GroupInfo, GroupMembership, GroupRole, Identity, ScanResult, Settings};
use groupwatch_scan::{ScanReport, ScanSubject};
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Table,
}

pub enum CommandOutput {
    Report(ScanReport),
    Roles {
        group: GroupInfo,
        roles: Vec<GroupRole>,
    },
    Resolved {
        input: String,
        identity: Option<Identity>,
    },
    Config(Settings),
}

impl CommandOutput {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            CommandOutput::Report(report) => json!({
                "summary": report.summary(),
                "report": report,
            }),
            CommandOutput::Roles { group, roles } => json!({
                "group": group,
                "roles": roles,
            }),
            CommandOutput::Resolved { input, identity } => json!({
                "input": input,
                "found": identity.is_some(),
                "identity": identity,
            }),
            CommandOutput::Config(settings) => serde_json::to_value(settings)?,
        })
    }
}

pub fn print_output(format: &OutputFormat, output: &CommandOutput) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output.to_json()?)?);
        }
        OutputFormat::Pretty => print_pretty(output)?,
        OutputFormat::Table => print_table(output)?,
    }
    Ok(())
}

fn membership_line(m: &GroupMembership) -> String {
    format!("{} ({}) as {} [rank {}]", m.group_name, m.group_id, m.role_name, m.rank)
}

fn print_pretty(output: &CommandOutput) -> Result<()> {
    match output {
        CommandOutput::Report(report) => print_report(report),
        CommandOutput::Roles { group, roles } => {
            println!(
                "{} {} ({}), {} members",
                "Group".cyan().bold(),
                group.name.bold(),
                group.id,
                group.member_count.to_string().yellow()
            );
            for (index, role) in roles.iter().enumerate() {
                println!(
                    "  {:>3}  rank {:>3}  {}  {}",
                    index.to_string().yellow(),
                    role.rank,
                    role.name.green(),
                    format!("({} members)", role.member_count).dimmed()
                );
            }
        }
        CommandOutput::Resolved { input, identity } => match identity {
            Some(identity) => println!(
                "{} {} -> {} ({})",
                "Resolved".cyan().bold(),
                input,
                identity.name.green(),
                identity.id.to_string().yellow()
            ),
            None => println!("{} {}", "Not found:".yellow().bold(), input),
        },
        CommandOutput::Config(settings) => print!("{}", settings.to_toml()?),
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    match &report.subject {
        None => {
            println!("{}", "Scan target not found".yellow().bold());
            return;
        }
        Some(ScanSubject::User(identity)) => {
            println!("{} {}", "Scan of user".cyan().bold(), identity.to_string().bold());
        }
        Some(ScanSubject::Group { group, roles }) => {
            println!(
                "{} {} ({}), {} members",
                "Scan of group".cyan().bold(),
                group.name.bold(),
                group.id,
                group.member_count
            );
            let names: Vec<String> = roles
                .iter()
                .map(|r| format!("{} ({})", r.name, r.rank))
                .collect();
            println!("  roles: {}", names.join(", "));
        }
    }

    for result in &report.results {
        print_result(result);
    }

    let summary = report.summary();
    println!();
    println!(
        "{} scanned {}, flagged {}, safe {}, skipped {} ({:.1}% flagged)",
        "Summary:".cyan().bold(),
        summary.scanned.to_string().yellow(),
        summary.flagged.to_string().red(),
        summary.safe.to_string().green(),
        summary.skipped,
        summary.flagged_ratio * 100.0
    );
    for (label, count) in &report.relation_counts {
        println!("  {}: {}", label, count);
    }
    for list in &report.truncated {
        println!(
            "  {} {} stopped after {} ({})",
            "note:".yellow(),
            list.list,
            list.items,
            list.reason
        );
    }
}

fn print_result(result: &ScanResult) {
    let tag = if result.is_alert() {
        "[FLAGGED]".red().bold()
    } else {
        "[ALLY]".yellow().bold()
    };
    println!(
        "\n{} {} ({}) - {}",
        tag,
        result.identity.name.bold(),
        result.identity.id,
        result.relation
    );
    for cluster in &result.clusters {
        println!("    watched: {}", membership_line(&cluster.core).red());
        for ally in &cluster.allies {
            println!("      allied: {}", membership_line(ally).yellow());
        }
    }
    for ally in &result.scanned_group_allies {
        println!("    ally of scanned group: {}", membership_line(ally).yellow());
    }
    if let Some(profile) = &result.profile {
        let created = profile
            .created
            .map(|c| c.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let banned = if profile.is_banned {
            " banned".red().to_string()
        } else {
            String::new()
        };
        println!("    created {}{}", created, banned);
    }
    if let Some(url) = &result.avatar_url {
        println!("    avatar {}", url.dimmed());
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "User")]
    name: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Relation")]
    relation: String,
    #[tabled(rename = "Watched groups")]
    watched: String,
    #[tabled(rename = "Allied groups")]
    allied: String,
    #[tabled(rename = "Alert")]
    alert: String,
}

impl From<&ScanResult> for ResultRow {
    fn from(result: &ScanResult) -> Self {
        let names = |groups: &[GroupMembership]| {
            groups
                .iter()
                .map(|m| m.group_name.clone())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut allied = result.ally_groups.clone();
        allied.extend(result.scanned_group_allies.iter().cloned());
        Self {
            name: result.identity.name.clone(),
            id: result.identity.id.to_string(),
            relation: result.relation.to_string(),
            watched: names(&result.core_groups),
            allied: names(&allied),
            alert: if result.is_alert() { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Stat")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl StatRow {
    fn new(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Tabled)]
struct RoleRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Rank")]
    rank: u8,
    #[tabled(rename = "Role")]
    name: String,
    #[tabled(rename = "Members")]
    members: u64,
}

fn print_table(output: &CommandOutput) -> Result<()> {
    match output {
        CommandOutput::Report(report) if report.found() => {
            let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::psql()));
            }

            let summary = report.summary();
            let mut stats = vec![
                StatRow::new("Scanned", summary.scanned),
                StatRow::new("Flagged", summary.flagged),
                StatRow::new("Safe", summary.safe),
                StatRow::new("Skipped", summary.skipped),
                StatRow::new("Flagged %", format!("{:.1}", summary.flagged_ratio * 100.0)),
            ];
            stats.extend(
                report
                    .relation_counts
                    .iter()
                    .map(|(label, count)| StatRow::new(label, count)),
            );
            println!("{}", Table::new(stats).with(Style::psql()));
        }
        CommandOutput::Roles { roles, .. } => {
            let rows = roles.iter().enumerate().map(|(index, role)| RoleRow {
                index,
                rank: role.rank,
                name: role.name.clone(),
                members: role.member_count,
            });
            println!("{}", Table::new(rows).with(Style::psql()));
        }
        // Nothing tabular to show
        other => print_pretty(other)?,
    }
    Ok(())
}
