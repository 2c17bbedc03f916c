use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use woundsnap_core::{
    classify, AutomationKind, CoreConfig, PatientId, ProgressCallback, RiskClassification,
    WorkflowOrchestrator, WorkflowProgress,
};

#[derive(Parser)]
#[command(name = "woundsnap")]
#[command(about = "WoundSnap wound documentation workflow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full workflow on a photo file
    Run {
        /// Path to a JPEG, PNG, GIF or WebP photo
        photo: PathBuf,
        /// Patient identifier used as the record subject
        #[arg(long, default_value = "demo-patient")]
        patient_id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
    /// Classify an infection risk percentage and severity label
    Classify {
        /// Infection risk, 0 to 100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        risk: u8,
        /// Severity label, e.g. "Stage 2"
        #[arg(default_value = "")]
        severity: String,
    },
    /// List the workflow steps in order
    Steps,
    /// Show which backend each collaborator uses
    Status {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
    /// Trigger the follow-up reminder workflow for a patient
    FollowUp {
        patient_id: String,
        /// JSON object describing the patient context
        #[arg(long)]
        context: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Serialize)]
struct Classification {
    risk_level: RiskClassification,
    workflow_kind: AutomationKind,
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

fn classification(risk: u8, severity: &str) -> Classification {
    let risk_level = classify(risk, severity);
    Classification {
        risk_level,
        workflow_kind: risk_level.automation_kind(),
    }
}

fn print_progress(progress: &WorkflowProgress) {
    eprintln!(
        "[{}/{}] {}: {}",
        progress.current_step, progress.total_steps, progress.step_name, progress.message
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("woundsnap_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            photo,
            patient_id,
            output,
        }) => {
            let bytes = std::fs::read(&photo)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", photo.display()))?;
            let orchestrator = WorkflowOrchestrator::from_config(&CoreConfig::from_env()?)?;
            let on_progress: &ProgressCallback = &print_progress;
            let result = orchestrator
                .execute_workflow(bytes, &patient_id, Some(on_progress))
                .await?;
            println!("{}", render(&result, output)?);
            if !result.success {
                anyhow::bail!(
                    "workflow failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Some(Commands::Classify { risk, severity }) => {
            let result = classification(risk, &severity);
            println!("{} ({})", result.risk_level, result.workflow_kind);
        }
        Some(Commands::Steps) => {
            for (number, step) in WorkflowOrchestrator::steps().into_iter().enumerate() {
                println!("{}. {}", number + 1, step);
            }
        }
        Some(Commands::Status { output }) => {
            let orchestrator = WorkflowOrchestrator::from_config(&CoreConfig::from_env()?)?;
            println!("{}", render(&orchestrator.configuration_status(), output)?);
        }
        Some(Commands::FollowUp {
            patient_id,
            context,
            output,
        }) => {
            let patient_id = PatientId::parse(&patient_id)?;
            let context = match context {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::json!({}),
            };
            let orchestrator = WorkflowOrchestrator::from_config(&CoreConfig::from_env()?)?;
            let outcome = orchestrator
                .automation()
                .trigger_follow_up(&patient_id, context)
                .await;
            println!("{}", render(&outcome, output)?);
        }
        None => {
            println!("Use 'woundsnap --help' for commands");
        }
    }

    Ok(())
}
