//! wikibridge: a bidirectional Wikitext to HTML transformer with
//! round-trip metadata.

#![warn(
    clippy::pedantic,
    clippy::missing_docs_in_private_items,
    missing_docs,
    rust_2018_idioms
)]

use crate::{
    config::SiteConfig,
    dom::serialize,
    env::{Env, EnvOptions, NullDataAccess, PageConfig},
};
use std::io::Read as _;

mod common;
mod config;
mod dom;
mod env;
mod passes;
mod pipeline;
#[cfg(test)]
mod tests;
mod tokenizer;
mod tokens;
mod transform;
mod treebuilder;

/// The transformation direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    /// Wikitext to HTML.
    #[default]
    Wt2Html,
    /// HTML to wikitext.
    Html2Wt,
    /// Wikitext round trip.
    Wt2Wt,
    /// HTML round trip.
    Html2Html,
}

/// Errors that may occur when parsing arguments.
#[derive(Debug, thiserror::Error)]
enum ArgsError {
    /// Several mode flags at once.
    #[error("at most one of --wt2html, --html2wt, --wt2wt, --html2html may be given")]
    ConflictingModes,
    /// An unsupported offset type.
    #[error("unsupported offset type '{0}' (only 'byte' is implemented)")]
    OffsetType(String),
    /// Extra unknown junk on the command line.
    #[error("unknown arguments: {}", _0.display())]
    Extra(std::ffi::OsString),
    /// Some other parsing error.
    #[error(transparent)]
    Pico(#[from] pico_args::Error),
}

/// Command-line arguments.
struct Args {
    /// The transformation direction.
    mode: Mode,
    /// The page title.
    page_name: String,
    /// Read input from this file instead of stdin.
    input_file: Option<String>,
    /// Emit the page bundle JSON alongside the HTML.
    pagebundle: bool,
    /// Processing options derived from the flags.
    options: EnvOptions,
    /// Trace channels to enable.
    trace: Vec<String>,
}

impl Args {
    /// Tries to create an [`Args`] from the command line.
    fn new() -> Result<Args, ArgsError> {
        let mut args = pico_args::Arguments::from_env();

        let mut mode = None;
        for (flag, value) in [
            ("--wt2html", Mode::Wt2Html),
            ("--html2wt", Mode::Html2Wt),
            ("--wt2wt", Mode::Wt2Wt),
            ("--html2html", Mode::Html2Html),
        ] {
            if args.contains(flag) {
                if mode.is_some() {
                    return Err(ArgsError::ConflictingModes);
                }
                mode = Some(value);
            }
        }

        let page_name = args
            .opt_value_from_str("--pageName")?
            .unwrap_or_else(|| "Main Page".to_string());
        // Accepted for CLI compatibility; the offline build has no API to
        // talk to.
        let _domain: Option<String> = args.opt_value_from_str("--domain")?;
        let _api_url: Option<String> = args.opt_value_from_str("--apiURL")?;
        let _content_version: Option<String> =
            args.opt_value_from_str("--outputContentVersion")?;
        let _selser = args.contains("--selser");
        let _old_text: Option<String> = args.opt_value_from_str("--oldtext")?;
        let _old_text_file: Option<String> = args.opt_value_from_str("--oldtextfile")?;
        let _old_html_file: Option<String> = args.opt_value_from_str("--oldhtmlfile")?;

        if let Some(offset_type) = args.opt_value_from_str::<_, String>("--offsetType")?
            && offset_type != "byte"
        {
            return Err(ArgsError::OffsetType(offset_type));
        }

        let options = EnvOptions {
            wrap_sections: args
                .opt_value_from_str("--wrapSections")?
                .unwrap_or(true),
            scrub_wikitext: args.contains("--scrubWikitext"),
            red_links: args.contains("--redlinks"),
            variant: args.opt_value_from_str("--variant")?,
            trace_time: false,
            dump: args
                .opt_value_from_str::<_, String>("--dump")?
                .map(|d| d.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
        };
        let _linting = args.contains("--linting");

        let trace: Vec<String> = args
            .opt_value_from_str::<_, String>("--trace")?
            .map(|t| t.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        let input_file = args.opt_value_from_str("--inputfile")?;
        let pagebundle = args.contains("--pagebundle");

        let rest = args.finish();
        if !rest.is_empty() {
            return Err(ArgsError::Extra(
                rest.join(std::ffi::OsStr::new(" ")),
            ));
        }

        let mut options = options;
        if trace.iter().any(|t| t == "time") {
            options.trace_time = true;
        }

        Ok(Self {
            mode: mode.unwrap_or_default(),
            page_name,
            input_file,
            pagebundle,
            options,
            trace,
        })
    }
}

/// Command line usage instructions.
fn usage() {
    let exe = std::env::args().next().unwrap_or_default();
    eprintln!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    eprintln!("Usage: {exe} [--wt2html] [options] < input.wikitext\n");
    eprintln!("Modes:");
    eprintln!("  --wt2html: Wikitext to HTML (default)");
    eprintln!("  --html2wt, --wt2wt, --html2html: require the serializer collaborator");
    eprintln!("Options:");
    eprintln!("  --pageName <title>: Page title (default: 'Main Page')");
    eprintln!("  --inputfile <path>: Read input from a file instead of stdin");
    eprintln!("  --pagebundle: Emit page bundle JSON instead of bare HTML");
    eprintln!("  --wrapSections <bool>: Wrap sections (default: true)");
    eprintln!("  --scrubWikitext: Normalize wikitext during serialization");
    eprintln!("  --redlinks: Annotate links to missing pages");
    eprintln!("  --variant <code>: Convert to a language variant");
    eprintln!("  --offsetType <byte|ucs2|char>: Offset space (only 'byte')");
    eprintln!("  --dump <shortcuts>: Dump pre/post DOM of the named passes");
    eprintln!("  --trace <channels>: Enable trace channels (e.g. time,tplwrap)");
}

/// Initializes logging, honoring `--trace` channels.
fn init_logging(trace: &[String]) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    for channel in trace {
        if channel != "time" {
            builder.filter(Some(&format!("trace/{channel}")), log::LevelFilter::Trace);
        }
    }
    let _ = builder.try_init();
}

/// Runs the CLI.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::new() {
        Ok(args) => args,
        Err(err) => {
            usage();
            return Err(err.into());
        }
    };

    init_logging(&args.trace);

    match args.mode {
        Mode::Wt2Html => {}
        other => {
            // The selective HTML to wikitext serializer is an external
            // collaborator; without it these modes cannot run.
            return Err(format!(
                "{other:?} requires the selective serializer, which is not part of this build"
            )
            .into());
        }
    }

    let source = match &args.input_file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let conf = SiteConfig::wmf();
    let data = NullDataAccess;
    let env = Env::new(
        &conf,
        &data,
        PageConfig {
            title: args.page_name.clone(),
            source,
            ..PageConfig::default()
        },
        args.options.clone(),
    );

    let doc = pipeline::parse_document(&env)?;
    let html = serialize::serialize_document(&doc);

    if args.pagebundle {
        let bundle = doc.bundle.as_ref();
        let out = serde_json::json!({
            "html": html,
            "pb": {
                "parsoid": bundle.map(|b| &b.parsoid),
                "mw": bundle.map(|b| &b.mw),
            },
            "categories": env.categories(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{html}");
    }

    Ok(())
}

/// Uses the [`Display`](core::fmt::Display) formatter for an error even
/// when the [`Debug`](core::fmt::Debug) formatter is requested.
struct DisplayError(Box<dyn std::error::Error>);

impl core::fmt::Debug for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl<E: Into<Box<dyn std::error::Error>>> From<E> for DisplayError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

fn main() -> Result<(), DisplayError> {
    run().map_err(Into::into)
}
