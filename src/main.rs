use std::{
    io::{self, Write},
    path::Path,
    process,
    sync::Arc,
};

use mdpress::{
    application::{
        clipboard::{CommandClipboard, CopyOutcome, copy_with_fallback},
        convert::{ConvertService, template_summary},
        error::AppError,
        export::{ArtifactSink, ExportArtifact, FsArtifactSink},
        render::{RenderPipelineConfig, configure_render_service, render_service},
        stats::text_stats,
    },
    config::{self, ConvertArgs, StatsArgs, TemplatesArgs},
    domain::catalog::TemplateCatalog,
    infra::{
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use mdpress_api_types::{ConvertRequest, TemplateSummary};
use tokio::io::AsyncReadExt;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const STDIN_MARKER: &str = "-";
const STDIN_BASENAME: &str = "document";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    configure_render_service(RenderPipelineConfig::from(&settings.render))?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, *args).await,
        config::Command::Templates(args) => run_templates(settings, args).await,
        config::Command::Stats(args) => run_stats(args).await,
    }
}

async fn load_catalog(settings: &config::Settings) -> Result<TemplateCatalog, AppError> {
    let mut catalog = TemplateCatalog::builtin()?;
    if let Some(path) = settings.templates.extra_file.as_ref() {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(InfraError::from)?;
        catalog.extend_from_toml(&source)?;
        info!(
            target = "mdpress::startup",
            path = %path.display(),
            templates = catalog.len(),
            "Loaded extra templates"
        );
    }
    Ok(catalog)
}

async fn build_convert_service(settings: &config::Settings) -> Result<ConvertService, AppError> {
    let catalog = load_catalog(settings).await?;
    Ok(ConvertService::new(render_service(), Arc::new(catalog)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let service = build_convert_service(&settings).await?;
    let router = http::build_router(ApiState::new(service));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "mdpress::startup",
        addr = %settings.server.addr,
        "Conversion API listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| InfraError::server(format!("server error: {err}")))?;

    info!(target = "mdpress::startup", "Conversion API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "mdpress::startup",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

async fn run_convert(settings: config::Settings, args: ConvertArgs) -> Result<(), AppError> {
    let service = build_convert_service(&settings).await?;
    let markdown = read_input(&args.input).await?;

    let request = ConvertRequest {
        markdown: Some(markdown.clone()),
        template_id: args.template_id.clone(),
        font_size: args.font_size,
        margin: args.margin,
        background_color: args.background.clone(),
    };
    let target = args.target;
    let conversion = tokio::task::spawn_blocking(move || service.convert(target, &request))
        .await
        .map_err(|err| AppError::unexpected(format!("conversion task failed: {err}")))??;

    if conversion.degraded > 0 {
        warn!(
            target = "mdpress::convert",
            degraded = conversion.degraded,
            "Some formulas or diagrams could not be rendered"
        );
    }

    if let Some(dir) = args.out_dir.as_ref() {
        let sink = FsArtifactSink::new(dir);
        let artifact = ExportArtifact::html(&input_basename(&args.input), conversion.html.clone());
        sink.write(&artifact).await?;
    } else if let Some(path) = args.output.as_ref() {
        tokio::fs::write(path, conversion.html.as_bytes())
            .await
            .map_err(InfraError::from)?;
    } else {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(conversion.html.as_bytes())
            .and_then(|()| stdout.write_all(b"\n"))
            .map_err(InfraError::from)?;
    }

    if args.copy {
        let clipboard = CommandClipboard::detect();
        let html = conversion.html;
        let outcome =
            tokio::task::spawn_blocking(move || copy_with_fallback(&clipboard, &html, &markdown))
                .await
                .map_err(|err| AppError::unexpected(format!("clipboard task failed: {err}")))??;
        if outcome == CopyOutcome::PlainFallback {
            warn!(
                target = "mdpress::convert",
                "Clipboard holds the HTML source as plain text"
            );
        }
    }

    Ok(())
}

async fn run_templates(settings: config::Settings, args: TemplatesArgs) -> Result<(), AppError> {
    let catalog = load_catalog(&settings).await?;
    let wanted = args.format.as_deref().map(str::trim);
    let summaries: Vec<TemplateSummary> = catalog
        .iter()
        .filter(|template| {
            wanted.is_none_or(|format| template.format.as_str().eq_ignore_ascii_case(format))
        })
        .map(template_summary)
        .collect();

    let rendered = if args.json {
        serde_json::to_string_pretty(&summaries)
            .map_err(|err| AppError::unexpected(format!("failed to encode templates: {err}")))?
    } else {
        let id_width = summaries.iter().map(|s| s.id.len()).max().unwrap_or(0);
        let format_width = summaries.iter().map(|s| s.format.len()).max().unwrap_or(0);
        summaries
            .iter()
            .map(|s| {
                format!(
                    "{:<id_width$}  {:<format_width$}  {}",
                    s.id, s.format, s.name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    println!("{rendered}");
    Ok(())
}

async fn run_stats(args: StatsArgs) -> Result<(), AppError> {
    let markdown = read_input(&args.input).await?;
    let stats = text_stats(&markdown);

    if args.json {
        let json = serde_json::to_string_pretty(&stats)
            .map_err(|err| AppError::unexpected(format!("failed to encode stats: {err}")))?;
        println!("{json}");
    } else {
        println!("chars: {}", stats.chars);
        println!("chars (no spaces): {}", stats.chars_no_spaces);
        println!("words: {}", stats.words);
        println!("lines: {}", stats.lines);
        println!("paragraphs: {}", stats.paragraphs);
        println!("reading time: {} min", stats.read_time_minutes);
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<String, AppError> {
    if path.as_os_str() == STDIN_MARKER {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .map_err(InfraError::from)?;
        return Ok(buffer);
    }
    Ok(tokio::fs::read_to_string(path)
        .await
        .map_err(InfraError::from)?)
}

fn input_basename(path: &Path) -> String {
    if path.as_os_str() == STDIN_MARKER {
        return STDIN_BASENAME.to_string();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| STDIN_BASENAME.to_string())
}
