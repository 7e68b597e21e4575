//! `show-config`: print the effective, validated policy

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::config::PolicyArgs;
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn run(args: &PolicyArgs, format: OutputFormat) -> Result<()> {
    let policy = args.load()?;

    match format {
        OutputFormat::Json => print_json(&policy)?,
        OutputFormat::Table => {
            println!("{}", "Effective Policy".bold());
            if let Some(path) = &args.policy_file {
                println!("Policy file: {}", path.display().to_string().cyan());
            }
            let rows = vec![
                SettingRow {
                    name: "min_safety_margin_pct",
                    value: format!("{}%", policy.min_safety_margin_pct),
                },
                SettingRow {
                    name: "max_safety_margin_pct",
                    value: format!("{}%", policy.max_safety_margin_pct),
                },
                SettingRow {
                    name: "max_reduction_pct",
                    value: format!("{}%", policy.max_reduction_pct),
                },
                SettingRow {
                    name: "min_user_floor",
                    value: policy.min_user_floor.to_string(),
                },
                SettingRow {
                    name: "min_system_floor",
                    value: policy.min_system_floor.to_string(),
                },
                SettingRow {
                    name: "discount_pct",
                    value: format!("{}%", policy.discount_pct),
                },
                SettingRow {
                    name: "cpu_underutil_threshold",
                    value: format!("{}%", policy.cpu_underutil_threshold),
                },
                SettingRow {
                    name: "mem_underutil_threshold",
                    value: format!("{}%", policy.mem_underutil_threshold),
                },
                SettingRow {
                    name: "anomaly_cpu_epsilon",
                    value: format!("{}%", policy.anomaly_cpu_epsilon),
                },
                SettingRow {
                    name: "vm_skew_threshold_pct",
                    value: format!("{} points", policy.vm_skew_threshold_pct),
                },
            ];
            print_table(rows, "No settings");
        }
    }

    Ok(())
}
