//! Static HTML summary of a training run, rendered with maud.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, DOCTYPE};

use crate::config::ParamSet;
use crate::metrics::{ConfusionMatrixRecord, MetricsRecord};

const STYLE: &str = "
body { font-family: sans-serif; margin: 2em auto; max-width: 960px; color: #222; }
h1 { border-bottom: 2px solid #ccc; padding-bottom: 0.3em; }
section { margin-bottom: 2em; }
table { border-collapse: collapse; margin: 0.5em 0; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
th { background-color: #f5f5f5; }
td.key { text-align: left; font-family: monospace; }
";

pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            content: Vec::new(),
        }
    }

    pub fn add_content(&mut self, markup: Markup) {
        self.content.push(markup);
    }
}

pub struct Report {
    title: String,
    subtitle: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(title: &str, subtitle: &str) -> Self {
        Report {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    style { (STYLE) }
                }
                body {
                    h1 { (self.title) }
                    p { (self.subtitle) }
                    @for s in &self.sections {
                        section {
                            h2 { (s.title) }
                            @for block in &s.content {
                                (block)
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
            }
        }
        fs::write(path, self.render().into_string())
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log::info!("Report saved to {}", path.display());
        Ok(())
    }
}

pub fn params_table(params: &ParamSet) -> Markup {
    html! {
        table {
            tr { th { "parameter" } th { "value" } }
            @for (key, value) in params {
                tr { td.key { (key) } td { (value.to_string()) } }
            }
        }
    }
}

pub fn metrics_table(records: &[MetricsRecord]) -> Markup {
    html! {
        table {
            tr {
                th { "dataset" }
                th { "precision" }
                th { "balanced accuracy" }
                th { "recall" }
                th { "f1" }
            }
            @for m in records {
                tr {
                    td.key { (m.dataset.to_string()) }
                    td { (format!("{:.4}", m.precision)) }
                    td { (format!("{:.4}", m.balanced_accuracy)) }
                    td { (format!("{:.4}", m.recall)) }
                    td { (format!("{:.4}", m.f1_score)) }
                }
            }
        }
    }
}

pub fn confusion_matrix_table(record: &ConfusionMatrixRecord) -> Markup {
    html! {
        h3 { (record.dataset.to_string()) }
        table {
            tr { th {} th { "predicted 0" } th { "predicted 1" } }
            tr {
                th { "true 0" }
                td { (record.true_0.predicted_0) }
                td { (record.true_0.predicted_1) }
            }
            tr {
                th { "true 1" }
                td { (record.true_1.predicted_0) }
                td { (record.true_1.predicted_1) }
            }
        }
    }
}
