//! Output formatting for multiple formats
//!
//! Formatters for the dependency graph dump and the effective configuration, as JSON,
//! YAML or human-readable text.
//!
//! # Example
//!
//! ```no_run
//! use cds_extractor::cli::output::{OutputFormat, OutputFormatter};
//! use cds_extractor::project::DependencyGraphBuilder;
//! use std::path::Path;
//!
//! let graph = DependencyGraphBuilder::new(Path::new("."))?.build();
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! println!("{}", formatter.format_graph(&graph)?);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::config::ExtractorConfig;
use crate::project::graph::DependencyGraph;

const HEAVY_RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Output formatter for graph dumps
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Creates a new output formatter with the specified format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a dependency graph according to the configured format
    pub fn format_graph(&self, graph: &DependencyGraph) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(graph)
                .context("Failed to serialize dependency graph to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(graph).context("Failed to serialize dependency graph to YAML")
            }
            OutputFormat::Human => Ok(self.format_graph_human(graph)),
        }
    }

    /// Formats configuration display
    pub fn format_config(&self, config: &ExtractorConfig) -> Result<String> {
        let config_map: BTreeMap<String, String> = config.to_display_map().into_iter().collect();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config_map)
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&config_map).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human => {
                let mut output = String::from("cds-extractor Configuration\n");
                output.push_str(HEAVY_RULE);
                output.push_str("\n\n");
                for (key, value) in &config_map {
                    output.push_str(&format!("  {}: {}\n", key, value));
                }
                Ok(output)
            }
        }
    }

    fn format_graph_human(&self, graph: &DependencyGraph) -> String {
        let mut output = String::new();

        output.push_str("CDS Dependency Graph\n");
        output.push_str(HEAVY_RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Source Root:  {}\n", graph.source_root_dir.display()));
        output.push_str(&format!("Phase:        {}\n", graph.current_phase));
        output.push_str(&format!(
            "Projects:     {}\n",
            graph.status_summary.total_projects
        ));
        output.push_str(&format!(
            "CDS Files:    {}\n\n",
            graph.status_summary.total_cds_files
        ));

        for project in graph.projects.values() {
            output.push_str(&format!("{}\n", project.project_dir));

            let plan = if project.plan.is_project_level() {
                "project-level".to_string()
            } else {
                format!("{} file(s)", project.plan.len())
            };
            output.push_str(&format!("\u{251C}\u{2500} Files:         {}\n", project.cds_files.len()));
            output.push_str(&format!("\u{251C}\u{2500} Plan:          {}\n", plan));
            if !project.expected_output_files.is_empty() {
                output.push_str(&format!(
                    "\u{251C}\u{2500} Outputs:       {}\n",
                    project.expected_output_files.join(", ")
                ));
            }
            if project.dependencies.is_empty() {
                output.push_str("\u{2514}\u{2500} Dependencies:  (none)\n\n");
            } else {
                output.push_str(&format!(
                    "\u{2514}\u{2500} Dependencies:  {}\n\n",
                    project.dependencies.join(", ")
                ));
            }
        }

        if !graph.status_summary.warnings.is_empty() {
            output.push_str("\u{26A0} Warnings:\n");
            for warning in &graph.status_summary.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }

        output
    }
}
