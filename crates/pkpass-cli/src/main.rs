//! Command-line interface for the pkpass wallet pass builder.
//!
//! Assembles a model directory into a signed `.pkpass`, using PEM-format
//! authority and signer certificates.

use clap::Parser;
use pkpass::{FieldArea, MergePolicy, PemSource, Project, Relevance, ScanCodeInput, TransitType};
use serde_json::{Map, Value};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pkpass")]
#[command(about = "Wallet pass assembly and signing tool")]
struct Cli {
    /// Model directory containing pass.json and image assets
    model: PathBuf,

    /// Output file, or "-" for stdout (default: <model name>.pkpass)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Authority (WWDR) certificate (PEM format)
    #[arg(long)]
    wwdr: PathBuf,

    /// Signer certificate (PEM format, may also hold the key)
    #[arg(long)]
    signer_cert: PathBuf,

    /// Signer private key (PEM format)
    #[arg(long)]
    signer_key: Option<PathBuf>,

    /// Passphrase for the signer private key
    #[arg(long, env = "PKPASS_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// JSON file with descriptor overrides
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Append to arrays and merge objects instead of replacing them
    #[arg(long)]
    extend: bool,

    /// Translations as LANG=FILE, FILE being a JSON object of strings (repeatable)
    #[arg(short = 'l', long = "localization", value_parser = parse_localization)]
    localizations: Vec<(String, PathBuf)>,

    /// JSON file mapping field area names (headerFields, ...) to field records
    #[arg(long)]
    fields: Option<PathBuf>,

    /// Expiration date (RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD)
    #[arg(long)]
    expiration: Option<String>,

    /// Mark the pass as voided
    #[arg(long)]
    voided: bool,

    /// Date at which the pass becomes relevant
    #[arg(long)]
    relevant_date: Option<String>,

    /// Maximum distance in meters for location relevance
    #[arg(long)]
    max_distance: Option<u64>,

    /// JSON file with an array of location records
    #[arg(long)]
    locations: Option<PathBuf>,

    /// JSON file with an array of beacon records
    #[arg(long)]
    beacons: Option<PathBuf>,

    /// Boarding pass transit type (PKTransitTypeAir, ...)
    #[arg(long, value_parser = parse_transit_type)]
    transit_type: Option<TransitType>,

    /// Scan-code message, expanded to every supported format
    #[arg(long, conflicts_with = "barcodes")]
    barcode: Option<String>,

    /// Alternative text shown below the scan code
    #[arg(long, requires = "barcode")]
    barcode_alt_text: Option<String>,

    /// Scan-code message encoding (default: iso-8859-1)
    #[arg(long, requires = "barcode")]
    barcode_encoding: Option<String>,

    /// JSON file with an array of explicit scan-code records
    #[arg(long)]
    barcodes: Option<PathBuf>,

    /// Format substring selecting the legacy scan code (e.g. "pdf417")
    #[arg(long, conflicts_with = "no_legacy_barcode")]
    legacy_barcode: Option<String>,

    /// Do not write the legacy scan code
    #[arg(long)]
    no_legacy_barcode: bool,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let project = build_project(&cli)?;
    let mut stream = project.assemble()?;

    let output = output_path(&cli);
    if output.as_os_str() == "-" {
        stream.write_to(io::stdout().lock())?;
    } else {
        stream.write_to(File::create(&output)?)?;
        eprintln!("Created: {}", output.display());
    }

    Ok(())
}

fn build_project(cli: &Cli) -> Result<Project, Box<dyn std::error::Error>> {
    let mut project = Project::new(&cli.model)
        .authority_certificate(PemSource::path(&cli.wwdr))
        .signer_certificate(PemSource::path(&cli.signer_cert))
        .compression_level(cli.zip_level);

    if let Some(ref key) = cli.signer_key {
        project = project.signer_key(PemSource::path(key));
    }
    if let Some(ref passphrase) = cli.passphrase {
        project = project.passphrase(passphrase.clone());
    }

    if cli.extend {
        project = project.merge_policy(MergePolicy::Extend);
    }
    if let Some(ref path) = cli.overrides {
        project = project.set_overrides(read_json_object(path)?);
    }

    for (lang, path) in &cli.localizations {
        let table = read_json_object(path)?;
        let entries = table
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())));
        project = project.add_localization(lang.clone(), entries);
    }

    if let Some(ref path) = cli.fields {
        for (area_name, records) in read_json_object(path)? {
            let area = FieldArea::from_key(&area_name)
                .ok_or_else(|| format!("Unknown field area '{}'", area_name))?;
            for record in as_array(records, &area_name)? {
                project = project.add_field(area, record);
            }
        }
    }

    if let Some(ref date) = cli.expiration {
        project = project.set_expiration(date);
    }
    if cli.voided {
        project = project.mark_voided();
    }

    if let Some(ref date) = cli.relevant_date {
        project = project.set_relevance(Relevance::RelevantDate(date.clone()));
    }
    if let Some(meters) = cli.max_distance {
        project = project.set_relevance(Relevance::MaxDistance(meters));
    }
    if let Some(ref path) = cli.locations {
        let records = as_array(read_json(path)?, "locations")?;
        project = project.set_relevance(Relevance::Locations(records));
    }
    if let Some(ref path) = cli.beacons {
        let records = as_array(read_json(path)?, "beacons")?;
        project = project.set_relevance(Relevance::Beacons(records));
    }

    if let Some(transit_type) = cli.transit_type {
        project = project.transit_type(transit_type);
    }

    if let Some(ref message) = cli.barcode {
        let mut input = ScanCodeInput::message(message.clone());
        if let Some(ref alt) = cli.barcode_alt_text {
            input = input.alt_text(alt.clone());
        }
        if let Some(ref encoding) = cli.barcode_encoding {
            input = input.encoding(encoding.clone());
        }
        project = project.set_scan_code(input);
    } else if let Some(ref path) = cli.barcodes {
        let records = as_array(read_json(path)?, "barcodes")?;
        project = project.set_scan_code(records);
    }

    if cli.no_legacy_barcode {
        project = project.select_legacy_scan_code(None);
    } else if let Some(ref selector) = cli.legacy_barcode {
        project = project.select_legacy_scan_code(Some(selector.as_str()));
    }

    Ok(project)
}

fn output_path(cli: &Cli) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| {
        let mut out = cli.model.clone();
        out.set_extension("pkpass");
        out
    })
}

fn parse_localization(arg: &str) -> Result<(String, PathBuf), String> {
    let (lang, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected LANG=FILE, got '{}'", arg))?;
    if lang.is_empty() || path.is_empty() {
        return Err(format!("expected LANG=FILE, got '{}'", arg));
    }
    Ok((lang.to_string(), PathBuf::from(path)))
}

fn parse_transit_type(arg: &str) -> Result<TransitType, String> {
    TransitType::parse(arg).ok_or_else(|| {
        format!(
            "unknown transit type '{}', expected one of: {}",
            arg,
            TransitType::ALL.map(|t| t.as_str()).join(", ")
        )
    })
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(serde_json::from_reader(io::BufReader::new(file))?)
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("{} must contain a JSON object", path.display()).into()),
    }
}

fn as_array(value: Value, what: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(format!("{} must be a JSON array", what).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [&str; 6] = [
        "pkpass",
        "model.pass",
        "--wwdr",
        "wwdr.pem",
        "--signer-cert",
        "signer.pem",
    ];

    fn parse(extra: &[&str]) -> Cli {
        Cli::try_parse_from(BASE.iter().chain(extra.iter())).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.zip_level, 6);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.extend);
        assert!(cli.localizations.is_empty());
        assert_eq!(output_path(&cli), PathBuf::from("model.pkpass"));
    }

    #[test]
    fn test_parse_verbose_levels() {
        assert_eq!(parse(&["-v"]).verbose, 1);
        assert_eq!(parse(&["-vv"]).verbose, 2);
    }

    #[test]
    fn test_parse_localization_pairs() {
        let cli = parse(&["-l", "it=it.json", "--localization", "de=de.json"]);
        assert_eq!(
            cli.localizations,
            vec![
                ("it".to_string(), PathBuf::from("it.json")),
                ("de".to_string(), PathBuf::from("de.json")),
            ]
        );
        assert!(Cli::try_parse_from(BASE.iter().chain(["-l", "it"].iter())).is_err());
    }

    #[test]
    fn test_parse_transit_type() {
        let cli = parse(&["--transit-type", "PKTransitTypeTrain"]);
        assert_eq!(cli.transit_type, Some(TransitType::Train));
        assert!(Cli::try_parse_from(BASE.iter().chain(["--transit-type", "rocket"].iter())).is_err());
    }

    #[test]
    fn test_barcode_flags_conflict() {
        assert!(Cli::try_parse_from(
            BASE.iter().chain(["--barcode", "X", "--barcodes", "codes.json"].iter())
        )
        .is_err());
        assert!(Cli::try_parse_from(BASE.iter().chain(["--barcode-alt-text", "alt"].iter())).is_err());
    }

    #[test]
    fn test_requires_certificates() {
        assert!(Cli::try_parse_from(["pkpass", "model.pass"]).is_err());
    }

    #[test]
    fn test_build_project_scan_codes() {
        let cli = parse(&["--barcode", "TICKET", "--legacy-barcode", "code128"]);
        let project = build_project(&cli).unwrap();
        let codes = project.scan_codes().unwrap();
        assert_eq!(codes.count(), 4);
        assert_eq!(codes.legacy().unwrap().format.as_str(), "PKBarcodeFormatCode128");
    }
}
