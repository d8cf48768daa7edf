//! Cairn command line.
//!
//! Resolves registry records into catalog models and prints the resulting
//! catalog tree:
//! - `cairn resolve record.json` works offline on a record stored in a file
//! - `cairn fetch <id> --url <registry>` resolves a live record over HTTP

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use cairn_resolve::{
	FetchError, HttpRegistryClient, MAGDA_REFERENCE, RecordQuery, Reference, ReferenceStatus, ReferenceTraits,
	RegistryClient, RegistryConfig, RegistryRecord, Resolution, Resolver, standard_order, standard_types,
};
use cairn_strata::{Catalog, CommonStrata, CommonTraits, Model, ModelId};
use clap::{Parser, Subcommand};
use rustc_hash::FxHashSet as HashSet;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Cairn command line arguments.
#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(about = "Resolve catalog registry records into catalog models")]
struct Args {
	/// Registry configuration file (TOML)
	#[arg(short, long, value_name = "PATH", global = true)]
	config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Resolve a record stored in a JSON file, without network access
	Resolve {
		/// Registry record (JSON)
		record: PathBuf,

		/// Override applied to the resolved model (JSON object)
		#[arg(long = "override", value_name = "PATH")]
		override_: Option<PathBuf>,
	},

	/// Fetch a record from a registry and resolve it
	Fetch {
		record_id: String,

		/// Registry root; defaults to `base_url` from the configuration
		#[arg(long, value_name = "URL")]
		url: Option<String>,

		/// Levels of child references to load after the record itself
		#[arg(long, default_value_t = 0)]
		depth: usize,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => RegistryConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => RegistryConfig::default(),
	};

	match args.command {
		Command::Resolve { record, override_ } => resolve(&config, &record, override_.as_deref()),
		Command::Fetch { record_id, url, depth } => fetch(&config, &record_id, url, depth).await,
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("cairn_resolve=debug,cairn_load=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Registry stand-in for offline resolution; every fetch fails.
#[derive(Debug)]
struct OfflineRegistry;

#[async_trait]
impl RegistryClient for OfflineRegistry {
	async fn fetch_record(&self, base_url: &str, query: &RecordQuery) -> Result<RegistryRecord, FetchError> {
		Err(FetchError::Transport {
			url: query.uri(base_url)?.to_string(),
			message: "offline".to_string(),
		})
	}
}

fn build(config: &RegistryConfig, client: Arc<dyn RegistryClient>) -> Result<Arc<Resolver>> {
	let settings = config.settings()?;
	let types = standard_types(standard_order()?)?;
	Ok(Arc::new(Resolver::new(Arc::new(Catalog::new()), types, client, settings)))
}

fn read_json(path: &Path) -> Result<Value> {
	let input = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	serde_json::from_str(&input).with_context(|| format!("parsing {}", path.display()))
}

fn resolve(config: &RegistryConfig, record_path: &Path, override_: Option<&Path>) -> Result<()> {
	let Some(record) = RegistryRecord::from_value(&read_json(record_path)?) else {
		bail!("{} does not hold a JSON object", record_path.display());
	};
	let override_: Option<Map<String, Value>> = match override_ {
		Some(path) => match read_json(path)? {
			Value::Object(map) => Some(map),
			_ => bail!("{} does not hold a JSON object", path.display()),
		},
		None => None,
	};

	let resolver = build(config, Arc::new(OfflineRegistry))?;
	let id = ModelId::new(record.id.as_deref().unwrap_or("root"));
	match resolver.resolve(&id, Some(&record), override_.as_ref(), None)? {
		Resolution::Resolved(model) => {
			info!(model = %model.id(), type_tag = model.type_tag(), models = resolver.catalog().len(), "resolved record");
			print!("{}", render(&resolver, &model)?);
		}
		Resolution::Unresolved => println!("{id}: unresolved, the record needs deeper dereferencing"),
	}
	Ok(())
}

async fn fetch(config: &RegistryConfig, record_id: &str, url: Option<String>, depth: usize) -> Result<()> {
	let Some(url) = url.or_else(|| config.base_url.clone()) else {
		bail!("no registry url: pass --url or set base_url in the configuration");
	};
	let client = HttpRegistryClient::new(&config.headers)?;
	let resolver = build(config, Arc::new(client))?;

	let model = resolver
		.types()
		.create(MAGDA_REFERENCE, ModelId::new(record_id))
		.context("reference type is not registered")?;
	model.set_trait(CommonStrata::DEFINITION, ReferenceTraits::RECORD_ID, record_id)?;
	model.set_trait(CommonStrata::DEFINITION, CommonTraits::URL, url.as_str())?;
	resolver.catalog().upsert(Arc::new(model));

	let reference = resolver.reference(record_id).context("reference was not registered")?;
	info!(record = record_id, %url, "resolving record");
	let Some(target) = reference.load(&resolver).await? else {
		println!("{record_id}: unresolved");
		return Ok(());
	};

	load_children(&resolver, &target, depth).await;
	print!("{}", render(&resolver, &target)?);
	Ok(())
}

/// Loads child references breadth-first, `depth` levels below `root`.
async fn load_children(resolver: &Arc<Resolver>, root: &Arc<Model>, depth: usize) {
	let mut visited = HashSet::default();
	let mut frontier = vec![root.clone()];

	for level in 0..depth {
		let mut next = Vec::new();
		for group in frontier {
			for member in group.get_strings(CommonTraits::MEMBERS) {
				if !visited.insert(member.clone()) {
					continue;
				}
				let Some(model) = resolver.catalog().get(&member) else {
					continue;
				};
				let Some(reference) = resolver.reference(&member) else {
					next.push(model);
					continue;
				};
				match reference.load(resolver).await {
					Ok(Some(target)) => next.push(target),
					Ok(None) => info!(member = %member, level, "child reference still unresolved"),
					Err(err) => warn!(member = %member, error = %err, "failed to load child reference"),
				}
			}
		}
		frontier = next;
	}
}

/// Indented catalog tree below `root`.
fn render(resolver: &Resolver, root: &Arc<Model>) -> Result<String> {
	let mut out = String::new();
	render_into(resolver, root, 0, &mut HashSet::default(), &mut out)?;
	Ok(out)
}

fn render_into(
	resolver: &Resolver,
	model: &Arc<Model>,
	depth: usize,
	visited: &mut HashSet<String>,
	out: &mut String,
) -> std::fmt::Result {
	let pad = "  ".repeat(depth);
	let id = model.id().as_str();
	let name = model.get_str(CommonTraits::NAME).unwrap_or_else(|| id.to_string());

	if Reference::is_reference(model)
		&& let Some(reference) = resolver.reference(id)
	{
		if let Some(target) = reference.target() {
			return render_into(resolver, &target, depth, visited, out);
		}
		return writeln!(out, "{pad}{name} [reference, {}] ({id})", status_label(reference.status()));
	}

	writeln!(out, "{pad}{name} [{}] ({id})", model.type_tag())?;
	if !visited.insert(id.to_string()) {
		return Ok(());
	}
	for member in model.get_strings(CommonTraits::MEMBERS) {
		match resolver.catalog().get(&member) {
			Some(child) => render_into(resolver, &child, depth + 1, visited, out)?,
			None => writeln!(out, "{pad}  {member} [missing]")?,
		}
	}
	Ok(())
}

fn status_label(status: ReferenceStatus) -> &'static str {
	match status {
		ReferenceStatus::Unresolved => "unresolved",
		ReferenceStatus::Resolving => "resolving",
		ReferenceStatus::Resolved => "resolved",
		ReferenceStatus::Failed => "failed",
	}
}
