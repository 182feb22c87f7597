use clap::{Arg, ArgAction, Command};
use limelight_dom::{to_html, Document};
use limelight_sandbox::harness::{DomRenderer, SimTransport, StubEval};
use limelight_sandbox::{HandlerSource, SandboxRegistry, Transport, WireResponse};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("limelight")
        .version("0.1.0")
        .about("Capability-mediated plugin sandboxes")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("demo")
                .about("Run two simulated plugins and print the resulting page")
                .arg(
                    Arg::new("html")
                        .long("html")
                        .action(ArgAction::SetTrue)
                        .help("Print the rendered page as HTML"),
                ),
        );

    let matches = cli.get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match matches.subcommand() {
        Some(("demo", args)) => run_demo(args.get_flag("html")).await,
        _ => Ok(()),
    }
}

/// Build a page with two sandboxed plugins backed by simulated
/// collaborators, drive their requests, and print the result.
async fn run_demo(html: bool) -> anyhow::Result<()> {
    let doc = Arc::new(Document::new());
    let status = doc.create_element("div");
    doc.set_attr(status, "class", "status")?;
    let content = doc.create_element("div");
    doc.set_attr(content, "class", "ajax")?;
    doc.append(doc.root(), status)?;
    doc.append(doc.root(), content)?;

    let transport = Arc::new(SimTransport::new());
    let registry = SandboxRegistry::new(
        Arc::clone(&doc),
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(StubEval::new()),
        Arc::new(DomRenderer::new(Arc::clone(&doc), status, content)),
    );

    let top = registry.root_context()?;

    let gallery = registry.get_or_create("gallery", &top.root(), &[("padding", "4px")])?;
    let uploader = registry.get_or_create("uploader", &top.root(), &[])?;

    // The gallery builds an image scoped to its own origin and a clickable
    // caption, then asks the server for more content.
    let image = gallery.root().append_element("img")?;
    image.set_source("images/front.jpeg")?;
    image.set_alt("front of the gallery")?;

    let caption = gallery.root().append_element("div")?;
    caption.set_class("caption")?;
    caption.append_text("Front door")?;
    caption.on_click(HandlerSource::new("set-class:caption-active"))?;

    gallery.root().append_placeholder("username")?;
    gallery.exec("log:ready\najax:refresh")?;

    // The uploader's refresh is denied server-side.
    uploader.exec("append-text:Drop files here\najax:refresh")?;

    transport.stage(
        "gallery/fill_placeholder/username",
        WireResponse::ok("application/json", r#"{"value": "Alice"}"#),
    );
    transport.stage(
        "gallery/refresh",
        WireResponse::javascript("append-text:two new photos"),
    );
    transport.stage(
        "uploader/refresh",
        WireResponse::envelope("error", "Permission denied"),
    );

    gallery.drive().await;
    uploader.drive().await;

    if html {
        println!("{}", to_html(&doc, doc.root()));
    } else {
        println!("sandboxes: {}", registry.len());
        for name in registry.names() {
            println!("  {name}");
        }
        println!("requests served:");
        for path in transport.requests() {
            println!("  {path}");
        }
    }
    Ok(())
}
