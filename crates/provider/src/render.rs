//! Built-in renderers and the formatting helpers they share.
//!
//! Renderers read service-specific fields out of `CloudObject::raw` by JSON pointer, so a
//! listing payload only needs the keys a column actually shows.

#![forbid(unsafe_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use cumulus_core::{
    tone, ColumnAttrs, ColumnRole, Header, HeaderColumn, Row, RowEvent, RowTone, MISSING_VALUE, NA_VALUE,
    UNKNOWN_VALUE,
};
use serde_json::Value;

use crate::{CloudObject, ProviderError, Renderer, Scope};

// ---------------- helpers ----------------

/// Age of `created` relative to now; unknown timestamps render as `<unknown>`.
pub fn to_age(created: Option<DateTime<Utc>>) -> String {
    to_age_at(created, Utc::now())
}

pub fn to_age_at(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match created {
        None => UNKNOWN_VALUE.to_string(),
        Some(t) => human_duration((now - t).to_std().unwrap_or_default()),
    }
}

/// Largest whole unit only: `3d`, `5h`, `2m`. Years kick in after 365 days.
pub fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }
    let days = secs / 86_400;
    if days > 365 {
        return format!("{}y", days / 365);
    }
    if days > 0 {
        return format!("{days}d");
    }
    let hours = secs / 3_600;
    if hours > 0 {
        return format!("{hours}h");
    }
    let minutes = secs / 60;
    if minutes > 0 {
        return format!("{minutes}m");
    }
    format!("{secs}s")
}

pub fn na(s: &str) -> String {
    if s.is_empty() { NA_VALUE.to_string() } else { s.to_string() }
}

pub fn missing(s: &str) -> String {
    if s.is_empty() { MISSING_VALUE.to_string() } else { s.to_string() }
}

pub fn bool_to_yes_no(b: bool) -> &'static str {
    if b { "Yes" } else { "No" }
}

/// Binary units with one decimal: `1.5 KiB`, `2.0 GiB`.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let (mut div, mut exp) = (UNIT, 0usize);
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = b"KMGTPE"[exp] as char;
    format!("{:.1} {unit}iB", bytes as f64 / div as f64)
}

pub fn format_size_gb(size_gb: i64) -> String {
    format!("{size_gb} GiB")
}

pub fn join_non_empty<'a, I>(sep: &str, parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(sep)
}

fn str_at<'a>(raw: &'a Value, ptr: &str) -> &'a str {
    raw.pointer(ptr).and_then(Value::as_str).unwrap_or_default()
}

fn bool_at(raw: &Value, ptr: &str) -> Option<bool> {
    raw.pointer(ptr).and_then(Value::as_bool)
}

fn object_payload(obj: &CloudObject) -> Result<&Value, ProviderError> {
    if obj.id.is_empty() {
        return Err(ProviderError::render("<empty>", "object has no id"));
    }
    if !obj.raw.is_object() {
        return Err(ProviderError::render(&obj.id, "raw payload is not a JSON object"));
    }
    Ok(&obj.raw)
}

fn col(name: &str) -> HeaderColumn {
    HeaderColumn::new(name)
}

fn wide(name: &str) -> HeaderColumn {
    HeaderColumn::with(name, ColumnAttrs::WIDE)
}

fn age() -> HeaderColumn {
    HeaderColumn::with(ColumnRole::Age.column_name(), ColumnAttrs::TIME)
}

fn state_tone(header: &Header, re: &RowEvent, name: &str, map: fn(&str) -> Option<RowTone>) -> RowTone {
    header
        .index_of(name, true)
        .and_then(|i| re.row.field(i))
        .map(|v| map(v).unwrap_or_default())
        .unwrap_or_else(|| tone::default_tone(header, re))
}

// ---------------- ec2/instance ----------------

pub struct Ec2Instance;

impl Renderer for Ec2Instance {
    fn header(&self, _scope: &Scope) -> Header {
        Header::new(vec![
            col("REGION"),
            col("INSTANCE-ID"),
            col("NAME"),
            col("TYPE"),
            col("STATE"),
            wide("AZ"),
            col("PRIVATE-IP"),
            wide("PUBLIC-IP"),
            wide("VPC-ID"),
            wide("VALID"),
            age(),
        ])
    }

    fn render(&self, obj: &CloudObject, _scope: &Scope) -> Result<Row, ProviderError> {
        let raw = object_payload(obj)?;
        let imdsv1 = str_at(raw, "/MetadataOptions/HttpTokens") == "optional";
        Ok(Row::new(
            format!("{}/{}", obj.region, obj.id),
            [
                obj.region.clone(),
                obj.id.clone(),
                na(&obj.name),
                str_at(raw, "/InstanceType").to_string(),
                str_at(raw, "/State/Name").to_string(),
                na(str_at(raw, "/Placement/AvailabilityZone")),
                str_at(raw, "/PrivateIpAddress").to_string(),
                str_at(raw, "/PublicIpAddress").to_string(),
                str_at(raw, "/VpcId").to_string(),
                join_non_empty(",", [if imdsv1 { "imdsv1-enabled" } else { "" }]),
                to_age(obj.created_at),
            ],
        ))
    }

    fn tone(&self, header: &Header, re: &RowEvent) -> RowTone {
        state_tone(header, re, "STATE", |state| match state {
            "stopped" => Some(RowTone::Pending),
            "pending" | "shutting-down" | "stopping" => Some(RowTone::Add),
            "terminated" => Some(RowTone::Killed),
            _ => None,
        })
    }
}

// ---------------- ec2/volume ----------------

pub struct Ec2Volume;

impl Renderer for Ec2Volume {
    fn header(&self, _scope: &Scope) -> Header {
        Header::new(vec![
            col("REGION"),
            col("VOLUME-ID"),
            col("NAME"),
            HeaderColumn::with("SIZE", ColumnAttrs::CAPACITY),
            col("TYPE"),
            col("STATE"),
            col("ENCRYPTED"),
            wide("ATTACHED-TO"),
            wide("AZ"),
            wide("VALID"),
            age(),
        ])
    }

    fn render(&self, obj: &CloudObject, _scope: &Scope) -> Result<Row, ProviderError> {
        let raw = object_payload(obj)?;
        let size = raw.pointer("/Size").and_then(Value::as_i64).map(format_size_gb);
        let encrypted = bool_at(raw, "/Encrypted");
        let attached = str_at(raw, "/Attachments/0/InstanceId");
        Ok(Row::new(
            format!("{}/{}", obj.region, obj.id),
            [
                obj.region.clone(),
                obj.id.clone(),
                na(&obj.name),
                size.unwrap_or_else(|| NA_VALUE.to_string()),
                str_at(raw, "/VolumeType").to_string(),
                str_at(raw, "/State").to_string(),
                encrypted.map_or(NA_VALUE, bool_to_yes_no).to_string(),
                na(attached),
                na(str_at(raw, "/AvailabilityZone")),
                join_non_empty(",", [if encrypted == Some(false) { "unencrypted" } else { "" }]),
                to_age(obj.created_at),
            ],
        ))
    }

    fn tone(&self, header: &Header, re: &RowEvent) -> RowTone {
        state_tone(header, re, "STATE", |state| match state {
            "creating" | "deleting" => Some(RowTone::Add),
            "error" => Some(RowTone::Error),
            _ => None,
        })
    }
}

// ---------------- s3/bucket ----------------

pub struct S3Bucket;

impl Renderer for S3Bucket {
    fn header(&self, _scope: &Scope) -> Header {
        Header::new(vec![col("NAME"), col("REGION"), age()])
    }

    fn render(&self, obj: &CloudObject, _scope: &Scope) -> Result<Row, ProviderError> {
        if obj.name.is_empty() {
            return Err(ProviderError::render(&obj.id, "bucket has no name"));
        }
        Ok(Row::new(obj.name.clone(), [obj.name.clone(), na(&obj.region), to_age(obj.created_at)]))
    }
}

// ---------------- iam/user ----------------

pub struct IamUser;

impl Renderer for IamUser {
    fn header(&self, _scope: &Scope) -> Header {
        Header::new(vec![col("USER-NAME"), wide("USER-ID"), wide("PATH"), wide("ARN"), age()])
    }

    fn render(&self, obj: &CloudObject, _scope: &Scope) -> Result<Row, ProviderError> {
        if obj.name.is_empty() {
            return Err(ProviderError::render(&obj.id, "user has no name"));
        }
        let arn = obj.arn.as_deref().unwrap_or_else(|| str_at(&obj.raw, "/Arn"));
        Ok(Row::new(
            obj.name.clone(),
            [
                obj.name.clone(),
                str_at(&obj.raw, "/UserId").to_string(),
                str_at(&obj.raw, "/Path").to_string(),
                arn.to_string(),
                to_age(obj.created_at),
            ],
        ))
    }
}

// ---------------- eks/cluster ----------------

pub struct EksCluster;

impl EksCluster {
    fn endpoint_access(raw: &Value) -> String {
        let Some(cfg) = raw.get("ResourcesVpcConfig").filter(|v| v.is_object()) else {
            return NA_VALUE.to_string();
        };
        let public = bool_at(cfg, "/EndpointPublicAccess").unwrap_or(false);
        let private = bool_at(cfg, "/EndpointPrivateAccess").unwrap_or(false);
        na(&join_non_empty("/", [if public { "Public" } else { "" }, if private { "Private" } else { "" }]))
    }

    fn validate(raw: &Value) -> String {
        let public = bool_at(raw, "/ResourcesVpcConfig/EndpointPublicAccess").unwrap_or(false);
        let cidrs: Vec<&str> = raw
            .pointer("/ResourcesVpcConfig/PublicAccessCidrs")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let unrestricted = public && (cidrs.is_empty() || cidrs == ["0.0.0.0/0"]);
        join_non_empty(",", [if unrestricted { "public-unrestricted" } else { "" }])
    }
}

impl Renderer for EksCluster {
    fn header(&self, _scope: &Scope) -> Header {
        Header::new(vec![
            col("REGION"),
            col("CLUSTER"),
            col("VERSION"),
            col("STATUS"),
            wide("ENDPOINT-ACCESS"),
            wide("VALID"),
            age(),
        ])
    }

    fn render(&self, obj: &CloudObject, _scope: &Scope) -> Result<Row, ProviderError> {
        let raw = object_payload(obj)?;
        let name = if obj.name.is_empty() { obj.id.as_str() } else { obj.name.as_str() };
        Ok(Row::new(
            format!("{}/{}", obj.region, name),
            [
                obj.region.clone(),
                name.to_string(),
                str_at(raw, "/Version").to_string(),
                str_at(raw, "/Status").to_string(),
                Self::endpoint_access(raw),
                Self::validate(raw),
                to_age(obj.created_at),
            ],
        ))
    }

    fn tone(&self, header: &Header, re: &RowEvent) -> RowTone {
        state_tone(header, re, "STATUS", |status| match status {
            "CREATING" | "UPDATING" => Some(RowTone::Add),
            "DELETING" => Some(RowTone::Killed),
            "FAILED" => Some(RowTone::Error),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn human_duration_picks_largest_unit() {
        assert_eq!(human_duration(Duration::from_millis(500)), "0s");
        assert_eq!(human_duration(Duration::from_secs(42)), "42s");
        assert_eq!(human_duration(Duration::from_secs(90 * 60)), "1h");
        assert_eq!(human_duration(Duration::from_secs(59 * 60)), "59m");
        assert_eq!(human_duration(Duration::from_secs(3 * 86_400 + 7)), "3d");
        assert_eq!(human_duration(Duration::from_secs(365 * 86_400)), "365d");
        assert_eq!(human_duration(Duration::from_secs(800 * 86_400)), "2y");
    }

    #[test]
    fn ages_parse_back_as_durations() {
        for secs in [5u64, 600, 7_200, 86_400 * 4] {
            let s = human_duration(Duration::from_secs(secs));
            assert_eq!(cumulus_core::sort::duration_to_seconds(&s) as u64, secs, "{s}");
        }
    }

    #[test]
    fn to_age_handles_unknown_and_future() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(to_age_at(None, now), UNKNOWN_VALUE);
        assert_eq!(to_age_at(Some(now + chrono::Duration::hours(1)), now), "0s");
        assert_eq!(to_age_at(Some(now - chrono::Duration::hours(5)), now), "5h");
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.0 GiB");
        assert_eq!(format_size_gb(100), "100 GiB");
    }

    #[test]
    fn placeholders() {
        assert_eq!(na(""), NA_VALUE);
        assert_eq!(missing(""), MISSING_VALUE);
        assert_eq!(na("x"), "x");
        assert_eq!(join_non_empty("/", ["a", "", "b"]), "a/b");
        assert_eq!(join_non_empty(",", [""]), "");
    }
}
