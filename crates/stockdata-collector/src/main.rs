//! stockdata 수집기 CLI.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockdata_collector::warehouse::{TableSchema, WarehouseSession};
use stockdata_collector::{run_collection, CollectorConfig, CollectorError, Pipeline, TickerOutcome};
use stockdata_data::{DataKind, LocalStore, YahooProvider};

#[derive(Parser)]
#[command(name = "stockdata-collector")]
#[command(about = "Incremental stock price/news collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 티커별 데이터 수집 및 동기화
    Collect {
        /// 수집할 티커 (쉼표로 구분, 예: "AAPL,MSFT"). 생략 시 기본 목록
        #[arg(long)]
        tickers: Option<String>,

        /// 수집할 데이터 종류
        #[arg(long, value_enum, default_value_t = KindArg::All)]
        kind: KindArg,

        /// 증분 계획을 무시하고 전체 이력 수집
        #[arg(long)]
        force: bool,

        /// 전체 이력 수집 시 기간 ("max", "5y", "6mo" 등, 기본값은 설정)
        #[arg(long)]
        period: Option<String>,

        /// 원격 웨어하우스 업로드 생략 (로컬 저장만)
        #[arg(long)]
        no_upload: bool,

        /// 뉴스 조회 최대 건수 (기본값은 설정)
        #[arg(long)]
        max_news: Option<usize>,
    },

    /// 웨어하우스 테이블 생성/스키마 대조
    InitTables,

    /// 로컬 데이터셋 요약 조회
    Summary {
        /// 대상 티커
        #[arg(long)]
        ticker: String,

        /// 데이터 종류
        #[arg(long, value_enum, default_value_t = KindArg::Price)]
        kind: KindArg,

        /// 원격 테이블 최근 행도 함께 조회
        #[arg(long)]
        remote: bool,

        /// 원격 조회 행 수
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Price,
    News,
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<DataKind> {
        match self {
            KindArg::Price => vec![DataKind::PriceHistory],
            KindArg::News => vec![DataKind::News],
            KindArg::All => vec![DataKind::PriceHistory, DataKind::News],
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CollectorError> {
    let cli = Cli::parse();

    // 로깅 초기화 (stockdata_collector, stockdata_data 모두 포함)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stockdata_collector={},stockdata_data={}",
                    cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("stockdata 수집기 시작");

    let config = CollectorConfig::from_env()?;

    match cli.command {
        Commands::Collect {
            tickers,
            kind,
            force,
            period,
            no_upload,
            max_news,
        } => {
            let tickers: Vec<String> = match tickers {
                Some(list) => list
                    .split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => config.default_tickers.clone(),
            };
            if tickers.is_empty() {
                return Err(CollectorError::Config(
                    "수집할 티커가 없습니다 (--tickers 또는 DEFAULT_TICKERS)".to_string(),
                ));
            }

            let upload = config.auto_upload && !no_upload;
            let session = if upload {
                Some(Arc::new(WarehouseSession::open(config.require_database_url()?).await?))
            } else {
                None
            };

            let provider = Arc::new(YahooProvider::new()?);
            let store = Arc::new(LocalStore::new(&config.data_dir));
            let mut pipeline = Pipeline::from_config(&config, provider, store, session.clone());
            if let Some(period) = period {
                pipeline.fetch_period = period;
            }
            if let Some(max_news) = max_news {
                pipeline.news_max_items = max_news;
            }

            let (results, stats) = run_collection(
                Arc::new(pipeline),
                &tickers,
                &kind.kinds(),
                force,
                config.concurrent_limit,
            )
            .await;

            for (ticker, reports) in &results {
                for report in reports {
                    match report.outcome {
                        TickerOutcome::Failed => tracing::error!(
                            ticker = %ticker,
                            kind = %report.kind,
                            error = report.error.as_deref().unwrap_or("-"),
                            "처리 실패"
                        ),
                        _ => tracing::info!(
                            ticker = %ticker,
                            kind = %report.kind,
                            outcome = ?report.outcome,
                            fetched = report.fetched,
                            added = report.records_added,
                            remote_added = report.remote_rows_added,
                            "처리 완료"
                        ),
                    }
                }
            }
            stats.log_summary("수집");
            tracing::debug!(
                results = %serde_json::to_string(&results).unwrap_or_default(),
                "티커별 상세 결과"
            );

            if let Some(session) = session {
                session.close().await;
            }
        }

        Commands::InitTables => {
            let session = WarehouseSession::open(config.require_database_url()?).await?;
            session
                .ensure_table(&TableSchema::price_history(config.price_table.clone()))
                .await?;
            session
                .ensure_table(&TableSchema::news(config.news_table.clone()))
                .await?;
            tracing::info!(
                price_table = %config.price_table,
                news_table = %config.news_table,
                "테이블 준비 완료"
            );
            session.close().await;
        }

        Commands::Summary {
            ticker,
            kind,
            remote,
            limit,
        } => {
            let ticker = ticker.to_uppercase();
            let store = LocalStore::new(&config.data_dir);

            for data_kind in kind.kinds() {
                match store.summary(data_kind, &ticker)? {
                    Some(summary) => tracing::info!(
                        ticker = %ticker,
                        kind = %data_kind,
                        records = summary.records,
                        first = %summary.first,
                        last = %summary.last,
                        "로컬 데이터셋 요약"
                    ),
                    None => tracing::info!(
                        ticker = %ticker,
                        kind = %data_kind,
                        "로컬 데이터셋 없음"
                    ),
                }
            }

            if remote {
                let session = WarehouseSession::open(config.require_database_url()?).await?;
                if kind == KindArg::Price || kind == KindArg::All {
                    let rows = session
                        .latest_prices(&config.price_table, &ticker, limit)
                        .await?;
                    for (date, close, volume) in rows {
                        tracing::info!(ticker = %ticker, date = %date, close = ?close, volume = ?volume, "원격 가격 행");
                    }
                }
                if kind == KindArg::News || kind == KindArg::All {
                    let rows = session
                        .latest_news(&config.news_table, &ticker, limit)
                        .await?;
                    for (id, title, publish_time) in rows {
                        tracing::info!(ticker = %ticker, id = %id, title = %title, publish_time = %publish_time, "원격 뉴스 행");
                    }
                }
                session.close().await;
            }
        }
    }

    Ok(())
}
