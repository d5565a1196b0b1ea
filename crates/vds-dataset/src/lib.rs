//! Reference model for versioned datasets.
//!
//! A [`Dataset`] ties a body to five component documents: [`Meta`],
//! [`Structure`], [`Transform`], [`Commit`] and [`Viz`]. Every component
//! implements [`Component`]: it is either a bare address reference or a
//! hydrated value, and it encodes to canonical JSON so that logically equal
//! values always produce identical bytes, and therefore identical
//! addresses.
//!
//! # Encoding rules
//!
//! 1. A component bound to an address with no other fields encodes as the
//!    address string.
//! 2. Otherwise it encodes as an object: keys sorted, zero values omitted,
//!    a `kind` tag included, the address left out.
//! 3. Decoding a string yields a reference; decoding an object yields a
//!    hydrated value with no address.

pub mod commit;
pub mod component;
pub mod dataset;
pub mod error;
pub mod format;
pub mod meta;
pub mod schema;
pub mod structure;
pub mod transform;
pub mod viz;

pub use commit::{format_timestamp, Commit, MAX_TITLE_LEN, SIGNABLE_DOMAIN};
pub use component::{CanonicalObject, Component, KIND_KEY};
pub use dataset::Dataset;
pub use error::{DatasetError, DatasetResult};
pub use format::{CsvOptions, DataFormat, FormatConfig, JsonOptions};
pub use meta::{License, Meta, Person};
pub use schema::{Schema, SchemaItems, SchemaType};
pub use structure::Structure;
pub use transform::{is_valid_bind_name, Transform};
pub use viz::Viz;

#[cfg(test)]
mod roundtrip {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use vds_types::{Address, ObjectId, DEFAULT_NAMESPACE};

    fn address() -> impl Strategy<Value = Address> {
        any::<[u8; 8]>().prop_map(|seed| Address::for_object(DEFAULT_NAMESPACE, &ObjectId::from_bytes(&seed)))
    }

    fn format() -> impl Strategy<Value = Option<DataFormat>> {
        prop::option::of(prop::sample::select(DataFormat::ALL.to_vec()))
    }

    prop_compose! {
        fn structure()(
            checksum in "[0-9a-f]{0,16}",
            depth in 0usize..6,
            entries in 0usize..1000,
            err_count in 0usize..10,
            format in format(),
            length in 0u64..1_000_000,
            header_row in any::<bool>(),
        ) -> Structure {
            let format_config = match format {
                Some(DataFormat::Csv) => Some(FormatConfig::Csv(CsvOptions { header_row, ..CsvOptions::default() })),
                _ => None,
            };
            Structure { checksum, depth, entries, err_count, format, format_config, length, ..Structure::default() }
        }
    }

    prop_compose! {
        fn commit()(title in ".{0,80}", message in ".{0,80}", secs in prop::option::of(0i64..4_000_000_000)) -> Commit {
            let timestamp = secs.and_then(|s| chrono::DateTime::from_timestamp(s, 0));
            Commit { timestamp, ..Commit::new(title, message) }
        }
    }

    /// Scalar and empty JSON values, zero values included.
    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,8}".prop_map(Value::from),
            Just(json!([])),
            Just(json!({})),
        ]
    }

    fn words() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,8}", 0..4)
    }

    prop_compose! {
        fn license()(kind in "[A-Z0-9-]{0,6}", url in "(https://[a-z]{1,8}\\.org)?") -> License {
            License { kind, url }
        }
    }

    prop_compose! {
        fn person()(id in "[a-z0-9]{0,4}", name in "[A-Za-z .]{0,12}", email in "([a-z]{1,5}@[a-z]{1,5}\\.org)?") -> Person {
            Person { id, name, email }
        }
    }

    prop_compose! {
        fn meta()(
            title in "[a-zA-Z ]{0,20}",
            description in ".{0,40}",
            license in prop::option::of(license()),
            keywords in words(),
            version in "[0-9.]{0,5}",
            contributors in prop::collection::vec(person(), 0..3),
            theme in words(),
            extra in prop::collection::btree_map("x_[a-z]{1,6}", leaf(), 0..4),
        ) -> Meta {
            let mut meta = Meta::titled(title);
            meta.description = description;
            meta.license = license;
            meta.keywords = keywords;
            meta.version = version;
            meta.contributors = contributors;
            meta.theme = theme;
            meta.extra = extra;
            meta
        }
    }

    prop_compose! {
        fn transform()(
            syntax in "(sql|python)?",
            app_version in "[0-9.]{0,5}",
            config in prop::collection::btree_map("[a-z]{1,6}", leaf(), 0..3),
            structure in prop::option::of(structure()),
            resources in prop::collection::btree_map("[a-z]{1,6}", address(), 0..3),
            script_path in prop::option::of(address()),
        ) -> Transform {
            let mut tf = Transform::new(syntax);
            tf.app_version = app_version;
            tf.config = config;
            tf.structure = structure;
            tf.resources = resources.into_iter().map(|(name, a)| (name, Dataset::new_ref(a))).collect();
            tf.script_path = script_path;
            tf
        }
    }

    prop_compose! {
        fn viz()(format in "(html|md)?", script_path in prop::option::of(address())) -> Viz {
            let mut viz = Viz::new(format);
            viz.script_path = script_path;
            viz
        }
    }

    fn slot<C: Component + std::fmt::Debug>(
        value: impl Strategy<Value = C>,
    ) -> impl Strategy<Value = Option<C>> {
        prop_oneof![
            Just(None),
            value.prop_map(Some),
            address().prop_map(|a| Some(C::new_ref(a))),
        ]
    }

    prop_compose! {
        fn dataset()(
            body_path in prop::option::of(address()),
            previous_path in prop::option::of(address()),
            structure in slot(structure()),
            commit in slot(commit()),
            meta in slot(meta()),
            transform in slot(transform()),
            viz in slot(viz()),
        ) -> Dataset {
            Dataset { body_path, previous_path, structure, commit, meta, transform, viz, ..Dataset::default() }
        }
    }

    /// A decoded value never carries an address unless it was a reference.
    fn unbound<C: Component>(mut value: C) -> C {
        if !value.is_ref() {
            value.set_path(None);
        }
        value
    }

    proptest! {
        #[test]
        fn structure_roundtrips(st in slot(structure())) {
            if let Some(st) = st {
                let decoded = Structure::from_json(&st.to_canonical_json().unwrap()).unwrap();
                prop_assert_eq!(decoded, unbound(st));
            }
        }

        #[test]
        fn commit_roundtrips(cm in commit()) {
            let decoded = Commit::from_json(&cm.to_canonical_json().unwrap()).unwrap();
            prop_assert_eq!(decoded, cm);
        }

        #[test]
        fn meta_roundtrips(meta in slot(meta())) {
            if let Some(meta) = meta {
                let bytes = meta.to_canonical_json().unwrap();
                let decoded = Meta::from_json(&bytes).unwrap();
                prop_assert_eq!(decoded.is_empty(), meta.is_empty());
                prop_assert_eq!(decoded, unbound(meta));
            }
        }

        #[test]
        fn transform_roundtrips(tf in slot(transform())) {
            if let Some(tf) = tf {
                let decoded = Transform::from_json(&tf.to_canonical_json().unwrap()).unwrap();
                prop_assert_eq!(decoded, unbound(tf));
            }
        }

        #[test]
        fn viz_roundtrips(viz in slot(viz())) {
            if let Some(viz) = viz {
                let decoded = Viz::from_json(&viz.to_canonical_json().unwrap()).unwrap();
                prop_assert_eq!(decoded, unbound(viz));
            }
        }

        #[test]
        fn dataset_roundtrips(ds in dataset()) {
            let bytes = ds.to_canonical_json().unwrap();
            let decoded = Dataset::from_json(&bytes).unwrap();
            prop_assert_eq!(decoded.to_canonical_json().unwrap(), bytes);
            prop_assert_eq!(decoded, ds);
        }
    }
}
