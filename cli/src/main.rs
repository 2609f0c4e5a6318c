// Copyright 2023 System76 <info@system76.com>
// SPDX-License-Identifier: MPL-2.0

mod layout;
mod mapping;

use std::fmt::Write as FmtWrite;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use nu_ansi_term::{Color, Style};
use tracing_subscriber::EnvFilter;
use vdagent_display::{
    AnyBackend, Backend, BackendKind, ConnectorMapping, LayoutEntry, Output, WaitPolicy,
};

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Reconcile compositor outputs with SPICE guest display layouts
#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Display configuration interface to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto, global = true)]
    backend: BackendChoice,

    /// KDL file mapping connector names to display ids.
    #[arg(long, global = true)]
    mapping: Option<PathBuf>,

    /// Maps a connector to a display id, overriding the mapping file.
    #[arg(long = "map", value_name = "CONNECTOR=ID", value_parser = mapping::parse_pair, global = true)]
    map: Vec<(String, u32)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List outputs and their modes.
    List {
        /// Display in KDL format.
        #[arg(long)]
        kdl: bool,
    },

    /// Show the display layout reported to the host.
    Resolutions,

    /// Apply a display layout requested by the host.
    Apply {
        /// Layout entries formatted as ID:WxH+X+Y.
        #[arg(required = true, value_parser = layout::parse_entry, allow_hyphen_values(true))]
        entries: Vec<LayoutEntry>,

        /// Rounds of event processing before giving up.
        #[arg(long, default_value_t = 50)]
        iterations: u32,

        /// Milliseconds between rounds.
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum BackendChoice {
    Auto,
    Kwin,
    Wlr,
    Mutter,
}

impl BackendChoice {
    fn connect(self) -> Result<AnyBackend, vdagent_display::Error> {
        match self {
            BackendChoice::Auto => AnyBackend::probe(),
            BackendChoice::Kwin => AnyBackend::connect(BackendKind::Kwin),
            BackendChoice::Wlr => AnyBackend::connect(BackendKind::Wlr),
            BackendChoice::Mutter => AnyBackend::connect(BackendKind::Mutter),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut mapping = match cli.mapping.as_deref() {
        Some(path) => mapping::load(path)?,
        None => ConnectorMapping::new(),
    };

    for (connector, display) in cli.map {
        mapping.insert(connector, display);
    }

    let (backend, command) = (cli.backend, cli.command);

    // Backends block on their event queue or bus connection.
    tokio::task::spawn_blocking(move || run(backend, &mapping, command)).await?
}

fn run(choice: BackendChoice, mapping: &ConnectorMapping, command: Commands) -> Result<(), Error> {
    let mut backend = choice.connect()?;

    let result = match command {
        Commands::List { kdl } => list_any(&mut backend, kdl),

        Commands::Resolutions => resolutions(&mut backend, mapping),

        Commands::Apply {
            entries,
            iterations,
            interval_ms,
        } => {
            let policy = WaitPolicy {
                iterations,
                interval: Duration::from_millis(interval_ms),
            };

            apply(&mut backend, mapping, &entries, &policy)
        }
    };

    backend.destroy();
    result
}

fn list_any(backend: &mut AnyBackend, kdl: bool) -> Result<(), Error> {
    let output = match backend {
        AnyBackend::Kwin(backend) => list(backend, kdl)?,
        AnyBackend::Wlr(backend) => list(backend, kdl)?,
        AnyBackend::Mutter(backend) => list(backend, kdl)?,
    };

    write_stdout(&output);
    Ok(())
}

fn list<B: Backend>(backend: &mut B, kdl: bool) -> Result<String, Error> {
    let snapshot = backend.refresh_and_snapshot()?;
    let mut output = String::new();

    for head in snapshot.outputs() {
        if kdl {
            list_kdl_output(&mut output, head);
        } else {
            list_output(&mut output, head);
        }
    }

    Ok(output)
}

fn connector_name<O, M>(output: &Output<O, M>) -> &str {
    output.connector.as_deref().unwrap_or("unknown")
}

fn list_output<O, M>(output: &mut String, head: &Output<O, M>) {
    let mut resolution = String::new();

    #[allow(clippy::ignored_unit_patterns)]
    let _res = fomat_macros::witeln!(
        output,
        (Style::new().bold().paint(connector_name(head))) " "
        if head.enabled {
            (Color::Green.bold().paint("(enabled)"))
        } else {
            (Color::Red.bold().paint("(disabled)"))
        }
        (Color::Yellow.bold().paint("\n  Position: "))
        (head.position.0) "," (head.position.1)
        (Color::Yellow.bold().paint("\n  Scale: "))
        (head.scale)
        (Color::Yellow.bold().paint("\n  Transform: "))
        (head.transform)
        (Color::Yellow.bold().paint("\n  Modes:"))
    );

    for mode in &head.modes {
        resolution.clear();
        let _res = write!(&mut resolution, "{}x{}", mode.width, mode.height);

        let _res = writeln!(
            output,
            "    {:>9} @ {}{}{}",
            Color::Magenta.paint(format!("{resolution:>9}")),
            Color::Cyan.paint(format!(
                "{:>3}.{:03} Hz",
                mode.refresh / 1000,
                mode.refresh % 1000
            )),
            if mode.current {
                Color::Purple.bold().paint(" (current)")
            } else {
                Color::default().paint("")
            },
            if mode.preferred {
                Color::Green.bold().paint(" (preferred)")
            } else {
                Color::default().paint("")
            }
        );
    }
}

fn list_kdl_output<O, M>(output: &mut String, head: &Output<O, M>) {
    #[allow(clippy::ignored_unit_patterns)]
    let _res = fomat_macros::witeln!(
        output,
        "output \"" (connector_name(head)) "\" enabled=" (head.enabled) " {\n"
        "  position " (head.position.0) " " (head.position.1) "\n"
        "  scale " (head.scale) "\n"
        "  transform \"" (head.transform) "\"\n"
        "  modes {"
    );

    for mode in &head.modes {
        let _res = writeln!(
            output,
            "    mode {} {} {}{}{}",
            mode.width,
            mode.height,
            mode.refresh,
            if mode.current { " current=true" } else { "" },
            if mode.preferred { " preferred=true" } else { "" },
        );
    }

    let _res = writeln!(output, "  }}\n}}");
}

fn resolutions(backend: &mut AnyBackend, mapping: &ConnectorMapping) -> Result<(), Error> {
    let resolutions = backend.get_resolutions(mapping)?;
    let mut output = String::new();

    for record in &resolutions.records {
        #[allow(clippy::ignored_unit_patterns)]
        let _res = fomat_macros::witeln!(
            &mut output,
            (Style::new().bold().paint(format!("display {}", record.display_id))) " "
            (Color::Magenta.paint(format!("{}x{}", record.width, record.height)))
            (Color::Cyan.paint(format!("{:+}{:+}", record.x, record.y)))
        );
    }

    #[allow(clippy::ignored_unit_patterns)]
    let _res = fomat_macros::witeln!(
        &mut output,
        (Color::Yellow.bold().paint("desktop: "))
        (resolutions.desktop_width) "x" (resolutions.desktop_height)
        ", " (resolutions.screen_count) " screen"
        if resolutions.screen_count != 1 { "s" }
    );

    write_stdout(&output);
    Ok(())
}

fn apply(
    backend: &mut AnyBackend,
    mapping: &ConnectorMapping,
    entries: &[LayoutEntry],
    policy: &WaitPolicy,
) -> Result<(), Error> {
    let report = backend.set_monitor_config(mapping, entries, policy)?;

    let mut output = String::new();

    for condition in &report.conditions {
        let _res = writeln!(&mut output, "{} {condition}", Color::Yellow.bold().paint("warning:"));
    }

    let _res = writeln!(
        &mut output,
        "{} {} of {} displays",
        Color::Green.bold().paint("applied"),
        report.applied,
        entries.len()
    );

    write_stdout(&output);
    Ok(())
}

fn write_stdout(output: &str) {
    let mut stdout = std::io::stdout().lock();
    let _res = stdout.write_all(output.as_bytes());
    let _res = stdout.flush();
}
