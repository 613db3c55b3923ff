use condsql::{config::AppConfig, db::{self, MysqlPool}};
use diesel_async::SimpleAsyncConnection;
use std::{env, future::Future, sync::Once};

static TRACING_INIT: Once = Once::new();

const SCHEMA: [&str; 2] = [
    "DROP TABLE IF EXISTS condsql_tasks",
    "CREATE TABLE condsql_tasks (
    ID BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    priority INT NOT NULL DEFAULT 0,
    status INT NOT NULL DEFAULT 1,
    employee VARCHAR(64) NULL,
    problems JSON NULL
)",
];

/// Runs `test` with a pool and the config it was built from, against a freshly
/// created `condsql_tasks` table.
///
/// Skips unless `CONDSQL_TEST_DATABASE_URL` points at a disposable MySQL database.
pub async fn with_mysql_harness<F, Fut>(test: F)
where
    F: FnOnce(MysqlPool, AppConfig) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });

    let Ok(database_url) = env::var("CONDSQL_TEST_DATABASE_URL") else {
        eprintln!("[condsql-test] skipping MySQL harness: CONDSQL_TEST_DATABASE_URL is not set");
        return;
    };

    let config = AppConfig {
        database_url: Some(database_url),
        max_pool_size: 2,
        default_limit: 50,
        ..AppConfig::default()
    };
    let pool = db::connect_pool(&config)
        .await
        .expect("failed to build test pool");

    {
        let mut conn = pool.get().await.expect("failed to check out connection");
        for ddl in SCHEMA {
            conn.batch_execute(ddl)
                .await
                .expect("failed to create condsql_tasks");
        }
    }

    test(pool, config).await;
}
