use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;
use serde::Serialize;

/// Структура, представляющая профиль пользователя Mini App.
///
/// Ключом во внешний мир служит `telegram_id`; `id` — внутренний ключ,
/// на который ссылаются статьи, репутация и продукты.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    /// Telegram ID пользователя (уникальный)
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Telegram Premium у пользователя (из initData)
    pub is_premium: bool,
    /// Тариф приложения: "free" или "premium"
    pub subscription_tier: String,
    /// Кэшированная сумма репутации; источник правды — reputation_history
    pub reputation: i64,
    pub show_name: bool,
    pub show_username: bool,
    pub show_avatar: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Поля профиля, приходящие из верифицированного initData при синхронизации.
#[derive(Debug)]
pub struct ProfileSync<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub is_premium: bool,
}

/// Статья. Создаётся в статусе `pending`; в `approved`/`rejected`
/// переводится только модерацией.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub preview: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub is_anonymous: bool,
    pub allow_comments: bool,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub telegram_message_id: Option<i64>,
    pub created_at: String,
}

/// Параметры новой статьи (уже нормализованные шлюзом: preview обрезан,
/// media_type выведен из URL).
#[derive(Debug)]
pub struct NewArticle<'a> {
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub title: &'a str,
    pub body: &'a str,
    pub preview: &'a str,
    pub media_url: Option<&'a str>,
    pub media_type: Option<&'a str>,
    pub is_anonymous: bool,
    pub allow_comments: bool,
}

/// Одна запись истории репутации вместе с display-полями отправителя.
#[derive(Debug, Clone, Serialize)]
pub struct ReputationEntry {
    pub id: i64,
    pub value: i64,
    pub created_at: String,
    pub from_user: GranterInfo,
}

/// Display-поля профиля, отдаваемые в истории репутации.
#[derive(Debug, Clone, Serialize)]
pub struct GranterInfo {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub show_name: bool,
    pub show_username: bool,
    pub show_avatar: bool,
    pub subscription_tier: String,
}

/// Продукт пользователя (максимум один активный на профиль).
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub profile_id: i64,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub media_url: Option<String>,
    pub link: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Параметры создания/обновления продукта.
#[derive(Debug)]
pub struct ProductInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub currency: &'a str,
    pub media_url: Option<&'a str>,
    pub link: Option<&'a str>,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = init_schema(&conn) {
        log::warn!("Failed to initialize schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create all tables and indexes if they don't exist yet.
///
/// Schema changes are additive only; existing columns are never mutated.
fn init_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER NOT NULL UNIQUE,
            username TEXT,
            first_name TEXT NOT NULL DEFAULT 'User',
            last_name TEXT,
            avatar_url TEXT,
            is_premium INTEGER NOT NULL DEFAULT 0,
            subscription_tier TEXT NOT NULL DEFAULT 'free',
            reputation INTEGER NOT NULL DEFAULT 0,
            show_name INTEGER NOT NULL DEFAULT 1,
            show_username INTEGER NOT NULL DEFAULT 1,
            show_avatar INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL REFERENCES profiles(id),
            category_id INTEGER,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            preview TEXT NOT NULL DEFAULT '',
            media_url TEXT,
            media_type TEXT,
            is_anonymous INTEGER NOT NULL DEFAULT 0,
            allow_comments INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'pending',
            rejection_reason TEXT,
            telegram_message_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_articles_author ON articles(author_id);

        CREATE TABLE IF NOT EXISTS reputation_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES profiles(id),
            from_user_id INTEGER NOT NULL REFERENCES profiles(id),
            value INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_rep_pair
            ON reputation_history(from_user_id, user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_rep_recipient
            ON reputation_history(user_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_profile_id INTEGER NOT NULL REFERENCES profiles(id),
            from_user_id INTEGER REFERENCES profiles(id),
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS user_products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL REFERENCES profiles(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            price REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'RUB',
            media_url TEXT,
            link TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_profile ON user_products(profile_id);",
    )
}

fn profile_from_row(row: &rusqlite::Row<'_>) -> Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        avatar_url: row.get(5)?,
        is_premium: row.get(6)?,
        subscription_tier: row.get(7)?,
        reputation: row.get(8)?,
        show_name: row.get(9)?,
        show_username: row.get(10)?,
        show_avatar: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

const PROFILE_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, avatar_url, \
     is_premium, subscription_tier, reputation, show_name, show_username, show_avatar, \
     created_at, updated_at";

/// Получает профиль по Telegram ID.
pub fn get_profile_by_telegram_id(conn: &DbConnection, telegram_id: i64) -> Result<Option<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM profiles WHERE telegram_id = ?",
        PROFILE_COLUMNS
    ))?;
    let mut rows = stmt.query(rusqlite::params![telegram_id])?;

    match rows.next()? {
        Some(row) => Ok(Some(profile_from_row(row)?)),
        None => Ok(None),
    }
}

/// Получает профиль по внутреннему id.
pub fn get_profile_by_id(conn: &DbConnection, id: i64) -> Result<Option<Profile>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS))?;
    let mut rows = stmt.query(rusqlite::params![id])?;

    match rows.next()? {
        Some(row) => Ok(Some(profile_from_row(row)?)),
        None => Ok(None),
    }
}

/// Upsert профиля по `telegram_id`.
///
/// Существующий профиль обновляется display-полями из initData; новый
/// создаётся с reputation = 0. Возвращает актуальную строку.
pub fn upsert_profile(conn: &DbConnection, sync: &ProfileSync) -> Result<Profile> {
    let existing = get_profile_by_telegram_id(conn, sync.telegram_id)?;

    match existing {
        Some(profile) => {
            conn.execute(
                "UPDATE profiles
                 SET username = ?1, first_name = ?2, last_name = ?3, avatar_url = ?4,
                     is_premium = ?5, updated_at = datetime('now')
                 WHERE id = ?6",
                rusqlite::params![
                    sync.username,
                    sync.first_name,
                    sync.last_name,
                    sync.avatar_url,
                    sync.is_premium,
                    profile.id,
                ],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO profiles (telegram_id, username, first_name, last_name, avatar_url, is_premium, reputation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                rusqlite::params![
                    sync.telegram_id,
                    sync.username,
                    sync.first_name,
                    sync.last_name,
                    sync.avatar_url,
                    sync.is_premium,
                ],
            )?;
        }
    }

    get_profile_by_telegram_id(conn, sync.telegram_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Обновляет тариф профиля ("free" / "premium").
pub fn set_subscription_tier(conn: &DbConnection, profile_id: i64, tier: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET subscription_tier = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![tier, profile_id],
    )?;
    Ok(())
}

/// Counts articles written by the given profile.
pub fn count_articles_by_author(conn: &DbConnection, author_id: i64) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM articles WHERE author_id = ?")?;
    stmt.query_row(rusqlite::params![author_id], |row| row.get(0))
}

/// Reputation recomputed from history (the source of truth).
///
/// The cached `profiles.reputation` column is an optimization kept in sync
/// by the grant gateway; sync responses always use this sum instead.
pub fn reputation_from_history(conn: &DbConnection, profile_id: i64) -> Result<i64> {
    let mut stmt =
        conn.prepare("SELECT COALESCE(SUM(value), 0) FROM reputation_history WHERE user_id = ?")?;
    stmt.query_row(rusqlite::params![profile_id], |row| row.get(0))
}

fn article_from_row(row: &rusqlite::Row<'_>) -> Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        author_id: row.get(1)?,
        category_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        preview: row.get(5)?,
        media_url: row.get(6)?,
        media_type: row.get(7)?,
        is_anonymous: row.get(8)?,
        allow_comments: row.get(9)?,
        status: row.get(10)?,
        rejection_reason: row.get(11)?,
        telegram_message_id: row.get(12)?,
        created_at: row.get(13)?,
    })
}

const ARTICLE_COLUMNS: &str = "id, author_id, category_id, title, body, preview, media_url, \
     media_type, is_anonymous, allow_comments, status, rejection_reason, telegram_message_id, \
     created_at";

/// Вставляет новую статью (всегда в статусе pending) и возвращает её.
pub fn insert_article(conn: &DbConnection, article: &NewArticle) -> Result<Article> {
    conn.execute(
        "INSERT INTO articles (author_id, category_id, title, body, preview, media_url, media_type, is_anonymous, allow_comments, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')",
        rusqlite::params![
            article.author_id,
            article.category_id,
            article.title,
            article.body,
            article.preview,
            article.media_url,
            article.media_type,
            article.is_anonymous,
            article.allow_comments,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_article_by_id(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Получает статью по id.
pub fn get_article_by_id(conn: &DbConnection, id: i64) -> Result<Option<Article>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS))?;
    let mut rows = stmt.query(rusqlite::params![id])?;

    match rows.next()? {
        Some(row) => Ok(Some(article_from_row(row)?)),
        None => Ok(None),
    }
}

/// Stores the Telegram message id of the moderation notice for an article.
pub fn set_article_telegram_message_id(conn: &DbConnection, article_id: i64, message_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE articles SET telegram_message_id = ?1 WHERE id = ?2",
        rusqlite::params![message_id, article_id],
    )?;
    Ok(())
}

/// Проверяет, давал ли отправитель репутацию получателю в течение окна.
///
/// Check-then-insert здесь не атомарен: два одновременных запроса могут
/// оба пройти проверку. Для модераторской фичи это принятый компромисс;
/// индекс idx_rep_pair держит проверку дешёвой.
pub fn has_recent_grant(conn: &DbConnection, from_user_id: i64, user_id: i64, window_hours: i64) -> Result<bool> {
    let modifier = format!("-{} hours", window_hours);
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM reputation_history
         WHERE from_user_id = ?1 AND user_id = ?2 AND created_at >= datetime('now', ?3)",
    )?;
    let count: i64 = stmt.query_row(rusqlite::params![from_user_id, user_id, modifier], |row| row.get(0))?;
    Ok(count > 0)
}

/// Вставляет запись о гранте репутации. Возвращает id записи.
pub fn insert_reputation_grant(conn: &DbConnection, user_id: i64, from_user_id: i64, value: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO reputation_history (user_id, from_user_id, value) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, from_user_id, value],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Инкрементирует кэшированный счётчик репутации профиля.
pub fn increment_profile_reputation(conn: &DbConnection, profile_id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET reputation = reputation + ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![delta, profile_id],
    )?;
    Ok(())
}

/// Создаёт уведомление для получателя.
pub fn insert_notification(
    conn: &DbConnection,
    user_profile_id: i64,
    from_user_id: Option<i64>,
    kind: &str,
    message: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (user_profile_id, from_user_id, type, message, is_read)
         VALUES (?1, ?2, ?3, ?4, 0)",
        rusqlite::params![user_profile_id, from_user_id, kind, message],
    )?;
    Ok(())
}

/// История репутации получателя (новые сверху), с display-полями
/// отправителей.
pub fn get_reputation_history(conn: &DbConnection, user_id: i64, limit: i64) -> Result<Vec<ReputationEntry>> {
    let mut stmt = conn.prepare(
        "SELECT h.id, h.value, h.created_at,
                p.id, p.first_name, p.last_name, p.username, p.avatar_url,
                p.show_name, p.show_username, p.show_avatar, p.subscription_tier
         FROM reputation_history h
         JOIN profiles p ON p.id = h.from_user_id
         WHERE h.user_id = ?1
         ORDER BY h.created_at DESC, h.id DESC
         LIMIT ?2",
    )?;

    let entries = stmt
        .query_map(rusqlite::params![user_id, limit], |row| {
            Ok(ReputationEntry {
                id: row.get(0)?,
                value: row.get(1)?,
                created_at: row.get(2)?,
                from_user: GranterInfo {
                    id: row.get(3)?,
                    first_name: row.get(4)?,
                    last_name: row.get(5)?,
                    username: row.get(6)?,
                    avatar_url: row.get(7)?,
                    show_name: row.get(8)?,
                    show_username: row.get(9)?,
                    show_avatar: row.get(10)?,
                    subscription_tier: row.get(11)?,
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn product_from_row(row: &rusqlite::Row<'_>) -> Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        currency: row.get(5)?,
        media_url: row.get(6)?,
        link: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const PRODUCT_COLUMNS: &str =
    "id, profile_id, title, description, price, currency, media_url, link, created_at, updated_at";

/// Количество продуктов профиля.
pub fn count_products(conn: &DbConnection, profile_id: i64) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM user_products WHERE profile_id = ?")?;
    stmt.query_row(rusqlite::params![profile_id], |row| row.get(0))
}

/// Вставляет продукт и возвращает его.
pub fn insert_product(conn: &DbConnection, profile_id: i64, input: &ProductInput) -> Result<Product> {
    conn.execute(
        "INSERT INTO user_products (profile_id, title, description, price, currency, media_url, link)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            profile_id,
            input.title,
            input.description,
            input.price,
            input.currency,
            input.media_url,
            input.link,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_product_by_id(conn, profile_id, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Получает продукт по id, принадлежащий профилю.
pub fn get_product_by_id(conn: &DbConnection, profile_id: i64, product_id: i64) -> Result<Option<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM user_products WHERE id = ? AND profile_id = ?",
        PRODUCT_COLUMNS
    ))?;
    let mut rows = stmt.query(rusqlite::params![product_id, profile_id])?;

    match rows.next()? {
        Some(row) => Ok(Some(product_from_row(row)?)),
        None => Ok(None),
    }
}

/// Обновляет продукт. Возвращает `Ok(false)` если продукт не найден
/// или принадлежит другому профилю.
pub fn update_product(
    conn: &DbConnection,
    profile_id: i64,
    product_id: i64,
    input: &ProductInput,
) -> Result<bool> {
    let rows_affected = conn.execute(
        "UPDATE user_products
         SET title = ?1, description = ?2, price = ?3, currency = ?4,
             media_url = ?5, link = ?6, updated_at = datetime('now')
         WHERE id = ?7 AND profile_id = ?8",
        rusqlite::params![
            input.title,
            input.description,
            input.price,
            input.currency,
            input.media_url,
            input.link,
            product_id,
            profile_id,
        ],
    )?;
    Ok(rows_affected > 0)
}

/// Удаляет продукт. Возвращает `Ok(false)` если продукт не найден.
pub fn delete_product(conn: &DbConnection, profile_id: i64, product_id: i64) -> Result<bool> {
    let rows_affected = conn.execute(
        "DELETE FROM user_products WHERE id = ? AND profile_id = ?",
        rusqlite::params![product_id, profile_id],
    )?;
    Ok(rows_affected > 0)
}
