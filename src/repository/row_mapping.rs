// ==========================================
// G-progress - 行映射辅助
// ==========================================
// 枚举列以 SCREAMING_SNAKE_CASE 文本存储
// 日期列 "%Y-%m-%d" / 时间戳列由 rusqlite chrono 特性读写
// ==========================================

use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;

/// 读取枚举列
pub fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// 读取可空枚举列
pub fn get_opt_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    })
    .transpose()
}

/// 读取 JSON 文本列
pub fn get_json<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
