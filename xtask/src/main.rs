use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for mips4kc")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Quick checks before commit (fmt, clippy)
    Check {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the project
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
        /// Run only fault injection tests
        #[arg(long)]
        fault: bool,
        /// Run only fault-aware value tests
        #[arg(long)]
        value: bool,
        /// Run only Memory module tests
        #[arg(long)]
        memory: bool,
        /// Run only CPU pipeline tests
        #[arg(long)]
        cpu: bool,
        /// Run only System module tests
        #[arg(long)]
        system: bool,
        /// Run only the end-to-end simulator tests
        #[arg(long)]
        integration: bool,
    },
    /// Run benchmarks
    Bench {
        /// Only benchmarks whose name contains this filter
        filter: Option<String>,
    },
    /// Pre-commit hook (fmt, clippy, test)
    PreCommit,
    /// Install git hooks
    InstallHooks,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Check { verbose } => run_check(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test {
            doc,
            ignored,
            fault,
            value,
            memory,
            cpu,
            system,
            integration,
        } => run_test(
            doc,
            ignored,
            TestSelection {
                fault,
                value,
                memory,
                cpu,
                system,
                integration,
            },
        ),
        Commands::Bench { filter } => run_bench(filter.as_deref()),
        Commands::PreCommit => run_pre_commit(),
        Commands::InstallHooks => install_hooks(),
    }
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task(
        "Test",
        || run_test(false, false, TestSelection::default()),
        verbose,
    )?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_check(verbose: bool) -> Result<()> {
    println!("{}", "=== Running Quick Checks ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ Checks passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("fmt").arg("--all");

    if check {
        cmd.arg("--").arg("--check");
    }

    execute_command(&mut cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy").arg("--all-targets").arg("--all-features");

    if fix {
        cmd.arg("--fix");
    } else {
        cmd.arg("--").arg("-D").arg("warnings");
    }

    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("build");

    if release {
        cmd.arg("--release");
    }

    execute_command(&mut cmd)
}

/// Test suites selected on the command line (none = everything)
#[derive(Debug, Default, Clone, Copy)]
struct TestSelection {
    fault: bool,
    value: bool,
    memory: bool,
    cpu: bool,
    system: bool,
    integration: bool,
}

impl TestSelection {
    fn suites(&self) -> [(bool, Suite); 6] {
        [
            (self.fault, Suite::Lib("core::fault", "Fault")),
            (self.value, Suite::Lib("core::value", "Value")),
            (self.memory, Suite::Lib("core::memory", "Memory")),
            (self.cpu, Suite::Lib("core::cpu", "CPU")),
            (self.system, Suite::Lib("core::system", "System")),
            (self.integration, Suite::Integration("simulator", "Integration")),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
enum Suite {
    /// Unit tests under a module path of the library
    Lib(&'static str, &'static str),
    /// One file under tests/
    Integration(&'static str, &'static str),
}

impl Suite {
    fn name(&self) -> &'static str {
        match *self {
            Suite::Lib(_, name) | Suite::Integration(_, name) => name,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("cargo");
        cmd.arg("test").arg("--all-features");
        match *self {
            Suite::Lib(path, _) => cmd.arg("--lib").arg(path),
            Suite::Integration(target, _) => cmd.arg("--test").arg(target),
        };
        cmd
    }
}

fn run_test(doc: bool, ignored: bool, selection: TestSelection) -> Result<()> {
    if doc {
        // Run doc tests
        let mut cmd = Command::new("cargo");
        cmd.arg("test").arg("--all-features").arg("--doc");

        if ignored {
            cmd.arg("--").arg("--ignored");
        }

        return execute_command(&mut cmd);
    }

    let selected: Vec<Suite> = selection
        .suites()
        .into_iter()
        .filter_map(|(enabled, suite)| enabled.then_some(suite))
        .collect();

    if selected.is_empty() {
        // Run all tests
        let mut cmd = Command::new("cargo");
        cmd.arg("test").arg("--all-features");

        if ignored {
            cmd.arg("--").arg("--ignored");
        }

        return execute_command(&mut cmd);
    }

    let mut all_success = true;

    for suite in &selected {
        println!("{} Running {} tests...", "→".blue(), suite.name().bold());

        let mut cmd = suite.command();
        if ignored {
            cmd.arg("--").arg("--ignored");
        }

        match execute_command(&mut cmd) {
            Ok(_) => {
                println!("{} {} tests passed\n", "✓".green(), suite.name());
            }
            Err(e) => {
                println!("{} {} tests failed\n", "✗".red(), suite.name());
                all_success = false;
                if selected.len() == 1 {
                    return Err(e);
                }
            }
        }
    }

    if all_success {
        Ok(())
    } else {
        anyhow::bail!("Some module tests failed")
    }
}

fn run_bench(filter: Option<&str>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("bench").arg("--bench").arg("pipeline_bench");

    if let Some(filter) = filter {
        cmd.arg("--").arg(filter);
    }

    execute_command(&mut cmd)
}

fn run_pre_commit() -> Result<()> {
    println!("{}", "=== Pre-commit Checks ===".bold().blue());

    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), false)?;
    run_task("Clippy", || run_clippy(false), false)?;
    run_task(
        "Test",
        || run_test(false, false, TestSelection::default()),
        false,
    )?;

    let elapsed = start.elapsed();
    println!(
        "\n{} {}",
        "✓ Pre-commit checks passed in".green().bold(),
        format!("{:.2}s", elapsed.as_secs_f64()).bold()
    );

    Ok(())
}

fn install_hooks() -> Result<()> {
    use std::fs;

    println!("{}", "Installing git hooks...".bold());

    let hook_content = r#"#!/bin/sh
# Auto-generated by cargo x install-hooks
set -e

echo "Running pre-commit checks..."
cargo x pre-commit
"#;

    let hook_path = ".git/hooks/pre-commit";
    fs::write(hook_path, hook_content)?;

    // Make executable (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut perms = fs::metadata(hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(hook_path, perms)?;
    }

    println!("{}", "✓ Git hooks installed".green());
    println!("  Pre-commit hook will run: fmt, clippy, test");

    Ok(())
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);

    let start = Instant::now();

    match task() {
        Ok(_) => {
            let elapsed = start.elapsed();
            println!(
                "{} {}",
                "✓".green().bold(),
                if verbose {
                    format!("({:.2}s)", elapsed.as_secs_f64())
                } else {
                    String::new()
                }
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }

    Ok(())
}
