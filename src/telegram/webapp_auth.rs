use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Пользователь Telegram, извлечённый из поля `user` подписанного initData.
///
/// Существует только в рамках одного запроса: после верификации identity
/// резолвится в профиль приложения и дальше не хранится.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

/// Причина отказа при валидации initData.
///
/// Каждый вариант соответствует machine-readable коду `reason`, который
/// уходит клиенту в JSON-ответе 401 (см. webapp.rs).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("initData has no hash parameter")]
    MissingHash,
    #[error("initData hash does not match the computed signature")]
    HashMismatch,
    #[error("initData has no user parameter")]
    MissingUser,
    #[error("initData user parameter is not valid JSON")]
    BadUserJson,
}

impl InitDataError {
    /// Стабильный код причины для JSON-ответов и логов.
    pub fn reason(&self) -> &'static str {
        match self {
            InitDataError::MissingHash => "missing_hash",
            InitDataError::HashMismatch => "hash_mismatch",
            InitDataError::MissingUser => "missing_user",
            InitDataError::BadUserJson => "bad_user_json",
        }
    }
}

/// Валидация Telegram Web App init data.
///
/// Telegram подписывает данные с помощью HMAC-SHA256.
/// Ключ для HMAC создаётся из bot token: HMAC_SHA256("WebAppData", bot_token).
/// Data-check string — все пары `key=value` кроме `hash`, отсортированные
/// и соединённые через `\n`. Порядок пар во входной строке значения не имеет.
///
/// `auth_date` на свежесть намеренно не проверяется: клиенты держат
/// мини-приложение открытым часами, и устаревший initData у них валиден.
///
/// # Аргументы
/// * `init_data` - Строка с параметрами от Telegram (query string format)
/// * `bot_token` - Токен бота
///
/// # Возвращает
/// `Ok(VerifiedUser)` если подпись верна и поле `user` распарсилось,
/// иначе типизированную причину отказа. Функция чистая и не паникует
/// на произвольном мусоре во входе.
pub fn verify_init_data(init_data: &str, bot_token: &str) -> Result<VerifiedUser, InitDataError> {
    let params = parse_query_pairs(init_data);

    let received_hash = params
        .iter()
        .find(|(key, _)| key == "hash")
        .map(|(_, value)| value.clone())
        .ok_or(InitDataError::MissingHash)?;

    // Data-check string: все пары кроме hash, отсортированные по строке "key=value"
    let mut check_pairs: Vec<String> = params
        .iter()
        .filter(|(key, _)| key != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    check_pairs.sort();
    let data_check_string = check_pairs.join("\n");

    // Secret key: HMAC_SHA256("WebAppData", bot_token)
    let mut secret_key_mac =
        HmacSha256::new_from_slice(b"WebAppData").expect("HMAC can take key of any size");
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    // Ожидаемый hash приходит hex-строкой; сравнение через verify_slice
    // даёт constant-time проверку вместо сравнения строк.
    let received_bytes = hex::decode(&received_hash).map_err(|_| InitDataError::HashMismatch)?;

    let mut mac = HmacSha256::new_from_slice(&secret_key).expect("HMAC can take key of any size");
    mac.update(data_check_string.as_bytes());
    mac.verify_slice(&received_bytes)
        .map_err(|_| InitDataError::HashMismatch)?;

    let user_json = params
        .iter()
        .find(|(key, _)| key == "user")
        .map(|(_, value)| value.clone())
        .ok_or(InitDataError::MissingUser)?;

    serde_json::from_str::<VerifiedUser>(&user_json).map_err(|_| InitDataError::BadUserJson)
}

/// Парсит query string в список пар, сохраняя все вхождения.
/// Значения URL-декодируются; пары без `=` игнорируются.
fn parse_query_pairs(init_data: &str) -> Vec<(String, String)> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => {
                    let decoded_value = urlencoding::decode(value).ok()?;
                    Some((key.to_string(), decoded_value.to_string()))
                }
                _ => None,
            }
        })
        .collect()
}
