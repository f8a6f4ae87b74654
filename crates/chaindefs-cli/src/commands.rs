use std::path::Path;

use anyhow::{bail, Context};
use chaindefs_crypto::{PublicKey, SigningKey};
use chaindefs_diff::{check_builtin, ChangeDetector, ChangePolicy, ChangeReport, Outcome};
use chaindefs_pipeline::{
    append_rejection, clear_rejections, load_candidates, load_definitions, load_rejections,
    rejection_journal, store_definitions, Pipeline, PipelineConfig, SignatureSource,
};
use chaindefs_types::{Definition, DefinitionSet, DefinitionsFile, Digest, Record};
use chrono::Utc;
use colored::Colorize;

use crate::cli::*;
use crate::prompt::{colorize_diff, TerminalResolver};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    match cli.command {
        Command::Reconcile(args) => cmd_reconcile(config, args),
        Command::Sign(args) => cmd_sign(config, args),
        Command::Generate(args) => cmd_generate(config, args),
        Command::Verify(args) => cmd_verify(config, args),
        Command::CheckBuiltin(args) => cmd_check_builtin(config, args),
        Command::Root(args) => cmd_root(config, args),
        Command::Keygen => cmd_keygen(),
    }
}

fn git_commit_hash() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn print_report(report: &ChangeReport) {
    for change in report.visible() {
        let marker = match change.outcome {
            Outcome::Informational => "~".yellow(),
            Outcome::Accepted => "✓".green(),
            Outcome::Rejected => "✗".red(),
        };
        println!("{} {} {}", marker, change.kind, change.key.to_string().bold());
        println!("{}", colorize_diff(&change.diff));
    }
    for key in &report.deleted {
        println!("{} {}", "deleted".red(), key);
    }
    for key in &report.resurrected {
        println!("{} {}", "restored".cyan(), key);
    }
    println!(
        "{} added, {} modified ({} rejected), {} deleted, {} restored",
        report.added.len().to_string().bold(),
        report.modified.len().to_string().bold(),
        report.rejected(),
        report.deleted.len().to_string().bold(),
        report.resurrected.len()
    );
}

/// External ids of records ranked at or above `top`.
fn top_ranked(set: &DefinitionSet, top: u32) -> Vec<String> {
    set.definitions()
        .filter(|d| d.external_rank().is_some_and(|rank| rank <= top))
        .filter_map(|d| d.external_id().map(str::to_string))
        .collect()
}

fn cmd_reconcile(config: PipelineConfig, args: ReconcileArgs) -> anyhow::Result<()> {
    let previous_path = args
        .previous
        .unwrap_or_else(|| config.definitions_path.clone());
    let previous = if previous_path.exists() {
        load_definitions(&previous_path)?.definitions
    } else {
        tracing::warn!(path = %previous_path.display(), "no previous definitions, starting empty");
        DefinitionSet::new()
    };
    let candidates = args
        .candidates
        .iter()
        .map(|path| load_candidates(path))
        .collect::<Result<Vec<_>, _>>()?;

    let policy = ChangePolicy::from_flags(args.interactive, args.force_accept)?;
    let highlight: Option<Vec<String>> = match &args.highlight {
        _ if args.show_all => None,
        Some(path) => Some(
            serde_json::from_str(&std::fs::read_to_string(path)?)
                .with_context(|| format!("reading highlight list {}", path.display()))?,
        ),
        None => Some(top_ranked(&previous, args.top)),
    };

    let journal = rejection_journal(&previous_path);
    let restored = load_rejections(&journal)?;
    if !restored.is_empty() {
        println!(
            "{} Resuming {} rejection(s) from {}",
            "↺".cyan(),
            restored.len(),
            journal.display()
        );
    }
    let stdin = std::io::stdin();
    let mut resolver = TerminalResolver::new(stdin.lock(), std::io::stdout());
    let mut checkpoint = |definition: &Definition| {
        if let Err(e) = append_rejection(&journal, definition) {
            tracing::error!(key = %definition.key(), error = %e, "could not journal rejection");
        }
    };

    let mut detector = ChangeDetector::new(policy);
    if policy == ChangePolicy::Prompt {
        detector = detector
            .with_resolver(&mut resolver)
            .with_checkpoint(&mut checkpoint);
    }
    if let Some(ids) = highlight {
        detector = detector.with_highlight(ids);
    }

    let pipeline = Pipeline::new(config);
    let reconciled = pipeline.resume_reconcile(&previous, candidates, restored, &mut detector)?;
    print_report(&reconciled.changes);
    for key in &reconciled.limits.dropped {
        println!("{} {} (malformed address)", "dropped".red(), key);
    }

    if reconciled.definitions == previous {
        clear_rejections(&journal)?;
        println!("{} No changes.", "✓".green());
        return Ok(());
    }

    let file = pipeline.commit(reconciled.definitions, Utc::now(), git_commit_hash())?;
    let output = args.output.unwrap_or(previous_path);
    store_definitions(&output, &file)?;
    clear_rejections(&journal)?;
    println!(
        "{} Wrote {} ({} live records)",
        "✓".green().bold(),
        output.display().to_string().bold(),
        file.definitions.live_count()
    );
    println!("  Merkle root: {}", file.metadata.merkle_root.to_string().yellow());
    Ok(())
}

fn read_signing_key(path: &Path) -> anyhow::Result<SigningKey> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let bytes: [u8; 32] = hex::decode(text.trim())?
        .try_into()
        .map_err(|_| anyhow::anyhow!("{}: expected a 32-byte hex seed", path.display()))?;
    Ok(SigningKey::from_bytes(bytes))
}

fn cmd_sign(config: PipelineConfig, args: SignArgs) -> anyhow::Result<()> {
    let path = config.definitions_path.clone();
    let pipeline = Pipeline::new(config);
    let mut file = load_definitions(&path)?;

    let signature = match (&args.signature, args.keys.is_empty()) {
        (Some(hex), _) => pipeline.attach_signature(&mut file, hex, args.verify, false)?,
        (None, false) => {
            let keys = args
                .keys
                .iter()
                .map(|path| read_signing_key(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            pipeline.sign(&mut file, &keys, false)?
        }
        (None, true) => bail!("give a signature or at least one --key"),
    };
    store_definitions(&path, &file)?;
    println!("{} Signature attached", "✓".green().bold());
    println!("  Merkle root: {}", file.metadata.merkle_root.to_string().yellow());
    println!("  Signers: {}", signature.mask.to_string().cyan());
    Ok(())
}

fn cmd_generate(mut config: PipelineConfig, args: GenerateArgs) -> anyhow::Result<()> {
    config.clean_output |= args.clean;
    let outdir = args.outdir.unwrap_or_else(|| config.output_dir.clone());
    let file = load_definitions(&config.definitions_path)?;
    let source = if args.dev_sign {
        SignatureSource::Dev
    } else {
        SignatureSource::Stored
    };

    let report = Pipeline::new(config).generate(&file, source, &outdir)?;
    println!(
        "{} Generated {} artifacts in {}",
        "✓".green().bold(),
        report.write.written.len().to_string().bold(),
        outdir.display()
    );
    println!("  Merkle root: {}", report.root.to_string().yellow());
    println!("  Signers: {}", report.signature.mask.to_string().cyan());
    for skipped in &report.write.skipped {
        println!("  {} {}", "skipped:".red(), skipped);
    }
    if report.encoding_errors > 0 {
        println!("  {} {} records could not be encoded", "warning:".yellow(), report.encoding_errors);
    }
    Ok(())
}

fn cmd_verify(config: PipelineConfig, args: VerifyArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.artifact)
        .with_context(|| format!("reading {}", args.artifact.display()))?;
    let (root, definition) = Pipeline::new(config).verify_artifact(&data, args.dev)?;
    println!("{} Artifact verified", "✓".green().bold());
    println!("  {} {} ({})", definition.kind(), definition.key().to_string().bold(), definition.name());
    println!("  Merkle root: {}", root.to_string().yellow());
    Ok(())
}

fn cmd_check_builtin(config: PipelineConfig, args: CheckBuiltinArgs) -> anyhow::Result<()> {
    let builtin = load_candidates(&args.builtin)?;
    let current = load_definitions(&config.definitions_path)?;
    let report = check_builtin(&builtin, &current.definitions, args.top)?;

    for (old, new) in &report.outdated {
        match new {
            Some(new) => println!("{} {} -> {}", "outdated".yellow(), old.key(), serde_json::to_string(new)?),
            None => println!("{} {} (no longer present)", "outdated".yellow(), old.key()),
        }
    }
    for network in &report.missing_networks {
        println!("{} network {} ({})", "missing".red(), network.chain_id, network.name);
    }
    for token in &report.missing_tokens {
        println!("{} token {}:{} ({})", "missing".red(), token.chain_id, token.address, token.name);
    }
    if report.is_ok() {
        println!("{} Built-in definitions are up to date.", "✓".green().bold());
    }
    Ok(())
}

/// Root of `file`: the stored one, or recomputed and checked against it.
fn current_root(pipeline: &Pipeline, file: &DefinitionsFile, stored: bool) -> anyhow::Result<Digest> {
    if stored {
        return Ok(file.metadata.merkle_root);
    }
    Ok(pipeline.check_root(file)?)
}

fn cmd_root(config: PipelineConfig, args: RootArgs) -> anyhow::Result<()> {
    let path = args
        .definitions
        .unwrap_or_else(|| config.definitions_path.clone());
    let file = load_definitions(&path)?;
    let root = current_root(&Pipeline::new(config), &file, args.stored)?;
    // bare hex on stdout for scripts
    println!("{root}");
    Ok(())
}

fn cmd_keygen() -> anyhow::Result<()> {
    let key = SigningKey::generate();
    let public: PublicKey = key.public_key();
    println!("Private key: {}", hex::encode(key.as_bytes()).red());
    println!("Public key:  {}", public.to_hex().green());
    Ok(())
}
