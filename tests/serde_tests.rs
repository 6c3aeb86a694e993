#[cfg(feature = "serde")]
mod serde_tests {
    use indexmap::IndexMap;
    use liqueur::{Chunk, IntoValue, ParseError, ParseErrorKind, SourceLoc, Value, scan};

    #[test]
    #[ntest::timeout(100)]
    fn test_chunk_serialization() {
        let chunks = scan("Hi {{ name }}").unwrap();
        let serialized = serde_json::to_string(&chunks[1]).unwrap();
        assert_eq!(
            serialized,
            r#"{"kind":"Object","name":"","args":"name","source":"{{ name }}","loc":{"line":1,"column":4}}"#
        );

        let deserialized: Chunk = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, chunks[1]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_parse_error_serialization() {
        let err = ParseError::new(
            SourceLoc::new(3, 1),
            ParseErrorKind::UnknownTag {
                name: "frobnicate".to_string(),
            },
        );
        let serialized = serde_json::to_string(&err).unwrap();
        assert_eq!(
            serialized,
            r#"{"loc":{"line":3,"column":1},"kind":{"UnknownTag":{"name":"frobnicate"}}}"#
        );

        let deserialized: ParseError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, err);
        assert_eq!(deserialized.to_string(), "Liquid error (line 3): unknown tag: frobnicate");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_value_serialization() {
        let mut page = IndexMap::new();
        page.insert("title".to_string(), "Home".into_value());
        page.insert("draft".to_string(), false.into_value());
        page.insert("tags".to_string(), vec![1_i64, 2].into_value());
        page.insert("author".to_string(), Value::Nil);

        let serialized = serde_json::to_string(&page.into_value()).unwrap();
        assert_eq!(
            serialized,
            r#"{"title":"Home","draft":false,"tags":[1,2],"author":null}"#
        );
    }
}
