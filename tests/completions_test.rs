//! Shell completion scripts cover the vsforge subcommands.

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use vsforge::cli::Cli;

fn script(shell: Shell) -> Result<String> {
    let mut buffer = Vec::new();
    generate(shell, &mut Cli::command(), "vsforge", &mut buffer);
    Ok(String::from_utf8(buffer)?)
}

#[test]
fn scripts_name_every_subcommand() -> Result<()> {
    for shell in [Shell::Bash, Shell::Fish, Shell::Zsh] {
        let output = script(shell)?;
        for subcommand in ["build", "validate", "completions"] {
            assert!(
                output.contains(subcommand),
                "{:?} completions do not mention '{}'",
                shell,
                subcommand
            );
        }
    }
    Ok(())
}

#[test]
fn build_flags_are_completed() -> Result<()> {
    let output = script(Shell::Fish)?;
    for flag in ["dry-run", "force", "log-level"] {
        assert!(output.contains(flag), "fish completions do not mention '--{}'", flag);
    }
    Ok(())
}

#[test]
fn binary_prints_completion_script() -> Result<()> {
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_vsforge"))
        .args(["completions", "zsh"])
        .output()?;

    assert!(output.status.success(), "vsforge completions zsh failed");
    assert!(String::from_utf8(output.stdout)?.starts_with("#compdef vsforge"));
    Ok(())
}
