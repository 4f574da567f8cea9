use chrono::{Duration, Utc};
use cumulus_core::{tone, ColumnRole, RowEvent, RowEventKind, RowTone, NA_VALUE};
use cumulus_provider::{builtin_resources, renderer_for, CloudObject, ProviderError, ResourceId, Scope};
use serde_json::json;

fn obj(id: &str, region: &str, raw: serde_json::Value) -> CloudObject {
    CloudObject {
        id: id.into(),
        region: region.into(),
        created_at: Some(Utc::now() - Duration::days(3)),
        raw,
        ..Default::default()
    }
}

fn field<'a>(header: &cumulus_core::Header, row: &'a cumulus_core::Row, name: &str) -> &'a str {
    let i = header.index_of(name, true).unwrap_or_else(|| panic!("no column {name}"));
    row.field(i).unwrap()
}

#[test]
fn builtin_rows_fill_every_declared_column() {
    let samples = [
        ("ec2/instance", obj("i-1", "us-east-1", json!({ "State": { "Name": "running" } }))),
        ("ec2/volume", obj("vol-1", "us-east-1", json!({ "Size": 8 }))),
        ("s3/bucket", CloudObject { name: "logs".into(), ..obj("logs", "", json!(null)) }),
        ("iam/user", CloudObject { name: "alice".into(), ..obj("AIDA1", "", json!(null)) }),
        ("eks/cluster", CloudObject { name: "prod".into(), ..obj("prod", "eu-west-1", json!({})) }),
    ];
    for (rid, o) in samples {
        let rid: ResourceId = rid.parse().unwrap();
        let r = renderer_for(&rid).unwrap();
        let header = r.header(&Scope::all());
        let row = r.render(&o, &Scope::all()).unwrap();
        row.check_width(&header).unwrap_or_else(|e| panic!("{rid}: {e}"));
        assert!(header.has_age(), "{rid}");
        assert_eq!(field(&header, &row, "AGE"), "3d", "{rid}");
    }
    assert_eq!(builtin_resources().len(), 5);
}

#[test]
fn ec2_instance_row_and_imdsv1_flag() {
    let r = renderer_for(&ResourceId::new("ec2", "instance")).unwrap();
    let header = r.header(&Scope::new("us-east-1"));
    let o = CloudObject {
        name: "web".into(),
        ..obj(
            "i-0abc",
            "us-east-1",
            json!({
                "InstanceType": "t3.micro",
                "State": { "Name": "running" },
                "Placement": { "AvailabilityZone": "us-east-1a" },
                "PrivateIpAddress": "10.0.0.5",
                "MetadataOptions": { "HttpTokens": "optional" }
            }),
        )
    };
    let row = r.render(&o, &Scope::new("us-east-1")).unwrap();
    assert_eq!(row.id, "us-east-1/i-0abc");
    assert_eq!(field(&header, &row, "NAME"), "web");
    assert_eq!(field(&header, &row, "TYPE"), "t3.micro");
    assert_eq!(field(&header, &row, "AZ"), "us-east-1a");
    assert_eq!(field(&header, &row, "PUBLIC-IP"), "");
    assert_eq!(field(&header, &row, "VALID"), "imdsv1-enabled");
    assert!(!tone::is_valid(&header, &row));
    // wide columns are hidden from narrow lookups
    assert_eq!(header.index_of("AZ", false), None);
    assert_eq!(header.role_index(ColumnRole::State), Some(4));
}

#[test]
fn ec2_instance_tone_follows_state() {
    let r = renderer_for(&ResourceId::new("ec2", "instance")).unwrap();
    let header = r.header(&Scope::all());
    let tone_for = |state: &str| {
        let row = r.render(&obj("i-1", "r", json!({ "State": { "Name": state } })), &Scope::all()).unwrap();
        r.tone(&header, &RowEvent::new(RowEventKind::Update, row))
    };
    assert_eq!(tone_for("running"), RowTone::Std);
    assert_eq!(tone_for("stopped"), RowTone::Pending);
    assert_eq!(tone_for("stopping"), RowTone::Add);
    assert_eq!(tone_for("terminated"), RowTone::Killed);
}

#[test]
fn ec2_volume_fields() {
    let r = renderer_for(&ResourceId::new("ec2", "volume")).unwrap();
    let header = r.header(&Scope::all());
    let attached = obj(
        "vol-1",
        "us-east-1",
        json!({ "Size": 100, "VolumeType": "gp3", "State": "in-use", "Encrypted": false,
                "Attachments": [{ "InstanceId": "i-9" }] }),
    );
    let row = r.render(&attached, &Scope::all()).unwrap();
    assert_eq!(field(&header, &row, "SIZE"), "100 GiB");
    assert_eq!(field(&header, &row, "ENCRYPTED"), "No");
    assert_eq!(field(&header, &row, "ATTACHED-TO"), "i-9");
    assert_eq!(field(&header, &row, "VALID"), "unencrypted");
    assert!(header.is_capacity_col(header.index_of("SIZE", false).unwrap()));

    let bare = r.render(&obj("vol-2", "us-east-1", json!({ "State": "error" })), &Scope::all()).unwrap();
    assert_eq!(field(&header, &bare, "SIZE"), NA_VALUE);
    assert_eq!(field(&header, &bare, "ENCRYPTED"), NA_VALUE);
    assert_eq!(field(&header, &bare, "ATTACHED-TO"), NA_VALUE);
    assert_eq!(field(&header, &bare, "VALID"), "");
    assert_eq!(r.tone(&header, &RowEvent::new(RowEventKind::Unchanged, bare)), RowTone::Error);
}

#[test]
fn eks_endpoint_access_and_validation() {
    let r = renderer_for(&ResourceId::new("eks", "cluster")).unwrap();
    let header = r.header(&Scope::all());
    let open = CloudObject {
        name: "prod".into(),
        ..obj(
            "prod",
            "eu-west-1",
            json!({ "Version": "1.29", "Status": "ACTIVE",
                    "ResourcesVpcConfig": { "EndpointPublicAccess": true, "EndpointPrivateAccess": true,
                                            "PublicAccessCidrs": ["0.0.0.0/0"] } }),
        )
    };
    let row = r.render(&open, &Scope::all()).unwrap();
    assert_eq!(row.id, "eu-west-1/prod");
    assert_eq!(field(&header, &row, "ENDPOINT-ACCESS"), "Public/Private");
    assert_eq!(field(&header, &row, "VALID"), "public-unrestricted");

    let locked = obj(
        "dev",
        "eu-west-1",
        json!({ "Status": "CREATING",
                "ResourcesVpcConfig": { "EndpointPublicAccess": true, "PublicAccessCidrs": ["10.0.0.0/8"] } }),
    );
    let row = r.render(&locked, &Scope::all()).unwrap();
    assert_eq!(field(&header, &row, "CLUSTER"), "dev");
    assert_eq!(field(&header, &row, "ENDPOINT-ACCESS"), "Public");
    assert_eq!(field(&header, &row, "VALID"), "");
    assert_eq!(r.tone(&header, &RowEvent::new(RowEventKind::Unchanged, row)), RowTone::Add);

    let none = r.render(&obj("x", "r", json!({})), &Scope::all()).unwrap();
    assert_eq!(field(&header, &none, "ENDPOINT-ACCESS"), NA_VALUE);
}

#[test]
fn malformed_objects_fail_to_render() {
    let r = renderer_for(&ResourceId::new("ec2", "instance")).unwrap();
    let err = r.render(&obj("i-1", "r", json!("not an object")), &Scope::all()).unwrap_err();
    assert!(matches!(err, ProviderError::Render { ref id, .. } if id == "i-1"));
    assert!(r.render(&obj("", "r", json!({})), &Scope::all()).is_err());

    let buckets = renderer_for(&ResourceId::new("s3", "bucket")).unwrap();
    assert!(buckets.render(&obj("b", "", json!(null)), &Scope::all()).is_err());
}

#[test]
fn default_tone_applies_to_plain_renderers() {
    let r = renderer_for(&ResourceId::new("iam", "user")).unwrap();
    let header = r.header(&Scope::all());
    let row = r
        .render(&CloudObject { name: "bob".into(), arn: Some("arn:aws:iam::1:user/bob".into()), ..obj("AIDA", "", json!(null)) }, &Scope::all())
        .unwrap();
    assert_eq!(field(&header, &row, "ARN"), "arn:aws:iam::1:user/bob");
    assert_eq!(r.tone(&header, &RowEvent::new(RowEventKind::Add, row)), RowTone::Add);
}
