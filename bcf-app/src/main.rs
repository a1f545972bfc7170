use std::path::PathBuf;

use bcf_config::{AppConfig, ConfigError};
use bcf_engine::command::{CommandBus, CommandContext, CommandRequest};
use bcf_engine::session::Session;
use bcf_io::{BcfFacade, DocumentLoader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod summary;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut archive: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            other => {
                if archive.is_some() {
                    eprintln!("只能指定一个归档文件：{other}");
                    std::process::exit(1);
                }
                archive = Some(PathBuf::from(other));
            }
        }
    }

    let Some(archive) = archive else {
        eprintln!("用法：bcf-app [--config <path>] <archive.bcfzip>");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!(archive = %archive.display(), "开始加载 BCF 归档");

    let facade = BcfFacade::with_config(config.loader.clone());
    let loaded = match facade.load(&archive) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "加载 BCF 归档失败");
            std::process::exit(1);
        }
    };

    let mut report = String::new();
    if let Err(err) = summary::render(&mut report, &loaded) {
        error!(error = %err, "生成加载摘要失败");
        std::process::exit(1);
    }
    print!("{report}");

    let mut session = Session::from_loaded(loaded);
    let bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };
    for name in ["resolve_references", "pending_changes"] {
        let response = bus.dispatch(&CommandRequest::new(name, &[]), &mut context);
        if let Some(message) = response.message {
            info!(command = name, "{message}");
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
