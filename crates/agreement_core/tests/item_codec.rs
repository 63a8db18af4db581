use agreement_core::codec::agreement_codec::{
    attr, create_item, format_timestamp, item_to_agreement, update_values, CodecError,
    EXPECTED_VERSION,
};
use agreement_core::{AgreementRequest, AttributeValue, Item, ValidationError};
use chrono::{DateTime, TimeZone, Utc};

fn deadline(month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, month, 1, 12, 0, 0).unwrap()
}

fn full_request() -> AgreementRequest {
    AgreementRequest {
        creator_xref: Some("alice".to_string()),
        participants: Some(vec!["carol".to_string(), "bob".to_string(), "bob".to_string()]),
        title: Some("Packers game".to_string()),
        description: Some("friendly".to_string()),
        conditions: Some("packers win".to_string()),
        punishment: Some("wear the jersey".to_string()),
        conditions_deadline: Some(deadline(1)),
        punishment_deadline: Some(deadline(2)),
        ..AgreementRequest::default()
    }
}

fn stored_item() -> Item {
    create_item(&full_request(), deadline(1)).unwrap()
}

#[test]
fn create_item_sets_identity_version_and_defaults() {
    let item = create_item(&full_request(), deadline(1)).unwrap();

    assert!(item.get(attr::AGREEMENT_ID).and_then(AttributeValue::as_s).is_some());
    assert_ne!(item.get(attr::AGREEMENT_ID), item.get(attr::XREF));
    assert_eq!(item.get(attr::VERSION), Some(&AttributeValue::n(1)));
    assert_eq!(
        item.get(attr::COMMISSIONER_XREF),
        Some(&AttributeValue::s("alice"))
    );
    assert_eq!(
        item.get(attr::PARTICIPANTS),
        Some(&AttributeValue::ss(["bob", "carol"]))
    );
    assert_eq!(
        item.get(attr::CREATED_AT),
        Some(&AttributeValue::s(format_timestamp(deadline(1))))
    );
    assert!(!item.contains_key(attr::RESULT_XREF));
    assert!(!item.contains_key(attr::IS_COMPLETE));
}

#[test]
fn create_item_mints_fresh_identifiers_per_call() {
    let first = create_item(&full_request(), deadline(1)).unwrap();
    let second = create_item(&full_request(), deadline(1)).unwrap();
    assert_ne!(first.get(attr::XREF), second.get(attr::XREF));
    assert_ne!(first.get(attr::AGREEMENT_ID), second.get(attr::AGREEMENT_ID));
}

#[test]
fn create_item_without_participants_stores_empty_set() {
    let request = AgreementRequest {
        participants: None,
        ..full_request()
    };
    let item = create_item(&request, deadline(1)).unwrap();
    assert_eq!(item.get(attr::PARTICIPANTS), Some(&AttributeValue::Ss(Vec::new())));
}

#[test]
fn create_item_checks_creator_before_other_fields() {
    let request = AgreementRequest {
        creator_xref: None,
        title: None,
        ..full_request()
    };
    assert_eq!(
        create_item(&request, deadline(1)).unwrap_err(),
        ValidationError::EmptyId
    );
}

#[test]
fn update_values_bind_placeholders_and_expected_version() {
    let request = AgreementRequest {
        version: Some(3),
        is_complete: Some(false),
        ..full_request()
    };
    let values = update_values(&request).unwrap();

    assert_eq!(values.get(":t"), Some(&AttributeValue::s("Packers game")));
    assert_eq!(values.get(":com"), Some(&AttributeValue::Bool(false)));
    assert_eq!(values.get(EXPECTED_VERSION), Some(&AttributeValue::n(3)));
    assert_eq!(
        values.get(":pund"),
        Some(&AttributeValue::s(format_timestamp(deadline(2))))
    );
    assert!(!values.contains_key(":comxref"));
    assert!(!values.contains_key(":rxref"));
}

#[test]
fn update_values_report_first_missing_field_in_order() {
    let request = AgreementRequest {
        version: Some(1),
        conditions: None,
        punishment_deadline: None,
        ..full_request()
    };
    assert_eq!(
        update_values(&request).unwrap_err(),
        ValidationError::MissingField("conditions")
    );
}

#[test]
fn decode_round_trips_created_item() {
    let agreement = item_to_agreement(&stored_item()).unwrap().unwrap();

    assert_eq!(agreement.creator_xref, "alice");
    assert_eq!(agreement.commissioner_xref, "alice");
    assert_eq!(agreement.participants, vec!["bob", "carol"]);
    assert_eq!(agreement.conditions_deadline, deadline(1));
    assert_eq!(agreement.punishment_deadline, deadline(2));
    assert_eq!(agreement.description.as_deref(), Some("friendly"));
    assert_eq!(agreement.comments, None);
    assert_eq!(agreement.version, 1);
}

#[test]
fn decode_empty_item_is_absent() {
    assert_eq!(item_to_agreement(&Item::new()).unwrap(), None);
}

#[test]
fn decode_treats_null_optionals_as_unset() {
    let mut item = stored_item();
    item.insert(attr::RESULT_XREF.to_string(), AttributeValue::Null);
    item.insert(attr::IS_COMPLETE.to_string(), AttributeValue::Null);
    item.insert(attr::COMMENTS.to_string(), AttributeValue::Null);

    let agreement = item_to_agreement(&item).unwrap().unwrap();
    assert_eq!(agreement.result_xref, None);
    assert_eq!(agreement.is_complete, None);
    assert_eq!(agreement.comments, None);
}

#[test]
fn decode_rejects_missing_required_attribute() {
    let mut item = stored_item();
    item.remove(attr::TITLE);
    assert_eq!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::MissingAttribute(attr::TITLE)
    );
}

#[test]
fn decode_rejects_wrong_types_and_null_markers() {
    let mut item = stored_item();
    item.insert(attr::CREATOR_XREF.to_string(), AttributeValue::n(5));
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::WrongType { attribute, found: "N", .. } if attribute == attr::CREATOR_XREF
    ));

    let mut item = stored_item();
    item.insert(attr::XREF.to_string(), AttributeValue::Null);
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::WrongType { attribute, found: "NULL", .. } if attribute == attr::XREF
    ));

    let mut item = stored_item();
    item.insert(attr::IS_COMPLETE.to_string(), AttributeValue::s("yes"));
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::WrongType { attribute, .. } if attribute == attr::IS_COMPLETE
    ));
}

#[test]
fn decode_rejects_empty_reference_and_bad_values() {
    let mut item = stored_item();
    item.insert(attr::XREF.to_string(), AttributeValue::s(""));
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::InvalidValue { attribute, .. } if attribute == attr::XREF
    ));

    let mut item = stored_item();
    item.insert(attr::CREATED_AT.to_string(), AttributeValue::s("yesterday"));
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::InvalidValue { attribute, .. } if attribute == attr::CREATED_AT
    ));

    let mut item = stored_item();
    item.insert(attr::VERSION.to_string(), AttributeValue::N("1.5".to_string()));
    assert!(matches!(
        item_to_agreement(&item).unwrap_err(),
        CodecError::InvalidValue { attribute, .. } if attribute == attr::VERSION
    ));
}
