use clap_complete::{generate, Shell};

pub fn run(shell: &str) -> anyhow::Result<()> {
    let shell: Shell = shell
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown shell '{shell}' (bash, zsh, fish, powershell, elvish)"))?;

    // The Cli type lives in main.rs; rebuild the command from there.
    let mut cmd = crate::build_cli();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
