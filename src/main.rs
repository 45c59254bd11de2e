//! Gallery Cache CLI
//!
//! Reads and edits the gallery through the offline-tolerant cache. Results are
//! printed as JSON on stdout; logs go to stderr.

use std::convert::Infallible;

use clap::{value_parser, Arg, ArgMatches, Command};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gallery_cache::config::{Config, LogFormat};
use gallery_cache::models::{
    Category, EntityId, EntityKind, ImageFilter, ImageMetadata, NewAnnotation, NewCategory,
    NewImage, Rect,
};
use gallery_cache::{CacheError, ErrorDetails, GalleryCache};

const KINDS: [&str; 3] = ["categories", "images", "annotations"];

fn cli() -> Command {
    Command::new("gallery-cache")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Offline-tolerant gallery cache")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("list")
                .about("Fetch a collection, falling back to the local cache")
                .arg(Arg::new("kind").required(true).value_parser(["categories", "images"])),
        )
        .subcommand(
            Command::new("annotations")
                .about("Fetch the annotations of one image")
                .arg(Arg::new("image-id").required(true)),
        )
        .subcommand(
            Command::new("show-image")
                .about("Read one image from the backend")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("add-category")
                .about("Create a category")
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("rename-category")
                .about("Rename a category")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("add-image")
                .about("Upload an image record")
                .arg(Arg::new("name").long("name").required(true))
                .arg(Arg::new("category").long("category").required(true))
                .arg(Arg::new("url").long("url").required(true))
                .arg(
                    Arg::new("size")
                        .long("size")
                        .value_parser(value_parser!(u64))
                        .help("File size in bytes"),
                )
                .arg(
                    Arg::new("resolution")
                        .long("resolution")
                        .help("Resolution such as 1024x768"),
                ),
        )
        .subcommand(
            Command::new("add-annotation")
                .about("Draw an annotation on an image")
                .arg(Arg::new("image").long("image").required(true))
                .arg(coordinate("x"))
                .arg(coordinate("y"))
                .arg(coordinate("width"))
                .arg(coordinate("height"))
                .arg(Arg::new("color").long("color").required(true))
                .arg(Arg::new("label").long("label")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an entity")
                .arg(Arg::new("kind").required(true).value_parser(KINDS))
                .arg(Arg::new("id").required(true))
                .arg(
                    Arg::new("image")
                        .long("image")
                        .help("Owning image (annotations only)"),
                ),
        )
        .subcommand(
            Command::new("pending")
                .about("Show local changes not yet reflected by the server")
                .arg(Arg::new("kind").required(true).value_parser(KINDS))
                .arg(
                    Arg::new("image")
                        .long("image")
                        .help("Owning image (annotations only)"),
                ),
        )
        .subcommand(
            Command::new("search-images")
                .about("Filter images by name and category")
                .arg(Arg::new("term").long("term"))
                .arg(Arg::new("category").long("category")),
        )
}

fn coordinate(name: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .required(true)
        .allow_negative_numbers(true)
        .value_parser(value_parser!(f64))
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (text, json) = match config.log_format {
        LogFormat::Text => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);
    let matches = cli().get_matches();

    let result = match GalleryCache::from_config(&config).await {
        Ok(cache) => run(&cache, &matches).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            let details = ErrorDetails::from(&e);
            let rendered = serde_json::to_string_pretty(&details).unwrap_or_else(|_| e.to_string());
            eprintln!("{}", rendered);
            std::process::exit(1);
        }
    }
}

async fn run(cache: &GalleryCache, matches: &ArgMatches) -> Result<String, CacheError> {
    match matches.subcommand() {
        Some(("list", args)) => match kind(args)? {
            EntityKind::Categories => to_json(&cache.categories().fetch().await?),
            EntityKind::Images => to_json(&cache.images().fetch().await?),
            EntityKind::Annotations => Err(CacheError::Validation(
                "Use `annotations <image-id>` to list annotations".to_string(),
            )),
        },
        Some(("annotations", args)) => {
            let image_id = id_arg(args, "image-id")?;
            to_json(&cache.annotations(&image_id).fetch().await?)
        }
        Some(("show-image", args)) => {
            let id = id_arg(args, "id")?;
            to_json(&cache.images().fetch_by_id(&id).await?)
        }
        Some(("add-category", args)) => {
            let name = string_arg(args, "name")?;
            to_json(&cache.categories().create(NewCategory::new(name)).await?)
        }
        Some(("rename-category", args)) => {
            let category = Category {
                id: id_arg(args, "id")?,
                name: string_arg(args, "name")?,
            };
            to_json(&cache.categories().update(category).await?)
        }
        Some(("add-image", args)) => {
            let size = args.get_one::<u64>("size").copied();
            let resolution = args.get_one::<String>("resolution").cloned();
            let metadata = (size.is_some() || resolution.is_some())
                .then_some(ImageMetadata { size, resolution });
            let draft = NewImage {
                name: string_arg(args, "name")?,
                category_id: id_arg(args, "category")?,
                url: string_arg(args, "url")?,
                metadata,
            };
            to_json(&cache.images().create(draft).await?)
        }
        Some(("add-annotation", args)) => {
            let image_id = id_arg(args, "image")?;
            let draft = NewAnnotation {
                image_id: image_id.clone(),
                rect: Rect {
                    x: number_arg(args, "x")?,
                    y: number_arg(args, "y")?,
                    width: number_arg(args, "width")?,
                    height: number_arg(args, "height")?,
                },
                color: string_arg(args, "color")?,
                label: args.get_one::<String>("label").cloned(),
            };
            to_json(&cache.annotations(&image_id).create(draft).await?)
        }
        Some(("delete", args)) => {
            let id = id_arg(args, "id")?;
            match kind(args)? {
                EntityKind::Categories => cache.categories().delete(&id).await?,
                EntityKind::Images => cache.images().delete(&id).await?,
                EntityKind::Annotations => {
                    let image_id = id_arg(args, "image")?;
                    cache.annotations(&image_id).delete(&id).await?
                }
            }
            to_json(&serde_json::json!({ "deleted": id }))
        }
        Some(("pending", args)) => match kind(args)? {
            EntityKind::Categories => to_json(&cache.categories().pending().await?),
            EntityKind::Images => to_json(&cache.images().pending().await?),
            EntityKind::Annotations => {
                let image_id = id_arg(args, "image")?;
                to_json(&cache.annotations(&image_id).pending().await?)
            }
        },
        Some(("search-images", args)) => {
            let filter = ImageFilter {
                search_term: args.get_one::<String>("term").cloned(),
                category_id: args
                    .get_one::<String>("category")
                    .map(|s| parse_id(s.as_str())),
            };
            let images = cache.images().fetch().await?;
            to_json(&filter.apply(&images))
        }
        Some((other, _)) => Err(CacheError::Internal(format!("Unhandled command {}", other))),
        None => Err(CacheError::Internal("No command given".to_string())),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn kind(args: &ArgMatches) -> Result<EntityKind, CacheError> {
    let raw = string_arg(args, "kind")?;
    EntityKind::parse(&raw)
        .ok_or_else(|| CacheError::Validation(format!("Unknown collection {}", raw)))
}

fn string_arg(args: &ArgMatches, name: &str) -> Result<String, CacheError> {
    args.get_one::<String>(name)
        .cloned()
        .ok_or_else(|| CacheError::Validation(format!("{} is required", name)))
}

fn id_arg(args: &ArgMatches, name: &str) -> Result<EntityId, CacheError> {
    Ok(parse_id(&string_arg(args, name)?))
}

/// Numeric arguments become numeric IDs, matching what the backend assigns.
fn parse_id(raw: &str) -> EntityId {
    raw.parse().unwrap_or_else(|never: Infallible| match never {})
}

fn number_arg(args: &ArgMatches, name: &str) -> Result<f64, CacheError> {
    args.get_one::<f64>(name)
        .copied()
        .ok_or_else(|| CacheError::Validation(format!("{} is required", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_cache::models::DurableId;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_annotation_args_parse() {
        let matches = cli()
            .try_get_matches_from([
                "gallery-cache",
                "add-annotation",
                "--image",
                "3",
                "--x",
                "10",
                "--y",
                "12.5",
                "--width",
                "40",
                "--height",
                "30",
                "--color",
                "#ff0000",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "add-annotation");
        assert!(matches!(
            id_arg(args, "image").unwrap(),
            EntityId::Durable(DurableId::Number(3))
        ));
        assert_eq!(number_arg(args, "y").unwrap(), 12.5);
        assert!(args.get_one::<String>("label").is_none());
    }

    #[test]
    fn test_list_rejects_unknown_kind() {
        assert!(cli()
            .try_get_matches_from(["gallery-cache", "list", "tags"])
            .is_err());
    }
}
