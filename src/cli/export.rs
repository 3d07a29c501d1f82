//! Playbook export command

use metis_core::{error::Result, render};
use std::{io::Write, path::PathBuf};
use tracing::debug;

use super::helpers::{open_playbook, open_store};

/// Handle the export command.
pub fn handle(output: Option<String>, global_store: Option<PathBuf>) -> Result<()> {
    if let Some(ref out_path) = output {
        debug!("Exporting playbook to {}...", out_path);
    } else {
        debug!("Exporting playbook to stdout...");
    }

    let (store, config) = open_store(global_store)?;
    let (playbook, _corpus) = open_playbook(&store, &config);
    let deltas = playbook.read_deltas();
    let markdown = render::export_markdown(&deltas);

    let write_output = |writer: &mut dyn Write| -> Result<()> {
        writer.write_all(markdown.as_bytes())?;
        Ok(())
    };

    if let Some(path) = output {
        let output_path = PathBuf::from(path);
        let mut file = std::fs::File::create(&output_path)?;
        write_output(&mut file)?;
        eprintln!(
            "Exported {} lessons to {}",
            deltas.len(),
            output_path.display()
        );
    } else {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        write_output(&mut handle)?;
    }

    Ok(())
}
