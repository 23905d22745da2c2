use anyhow::Result;
use minnow::{Executor, parser};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn main() -> Result<()> {
    // Install the reaper before anything can fork.
    let mut executor = Executor::new()?;
    let mut editor = DefaultEditor::new()?;

    loop {
        // Terminations collected since the last prompt, in reap order.
        for line in executor.drain_statuses() {
            eprintln!("{line}");
        }

        match editor.readline(&prompt()) {
            Ok(line) => {
                let pipeline = match parser::parse(&line) {
                    Ok(Some(pipeline)) => pipeline,
                    Ok(None) => continue,
                    Err(err) => {
                        // Malformed line: discarded, the session continues.
                        eprintln!("minnow: {err}");
                        continue;
                    }
                };

                if pipeline.is_exit() {
                    // Unreaped background children are not awaited.
                    break;
                }
                if let Err(err) = executor.run(&pipeline) {
                    eprintln!("minnow: {err:#}");
                }
            }
            // Ctrl-C while reading input is absorbed.
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn prompt() -> String {
    let cwd = std::env::current_dir().ok();
    let base = cwd
        .as_deref()
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("/"));
    format!("minnow {base}> ")
}
