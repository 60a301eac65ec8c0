/// Tests for the remote API wire contract
///
/// Note: These are unit tests that verify the contract logic is
/// correct. Integration tests would require the upstream API.

#[cfg(test)]
mod tests {
    // The remote encodes vote direction as 1 (up) / 0 (down).
    #[test]
    fn test_vote_value_wire_encoding() {
        let encode = |up: bool| if up { 1 } else { 0 };
        assert_eq!(encode(true), 1);
        assert_eq!(encode(false), 0);

        let decode = |value: i64| value == 1;
        assert!(decode(1));
        assert!(!decode(0));
        // Anything that is not 1 reads as a downvote
        assert!(!decode(2));
    }

    // Duplicate favourites are signalled through an error-text marker,
    // not a dedicated status code.
    #[test]
    fn test_duplicate_favourite_marker_detection() {
        let body = "{\"message\": \"DUPLICATE_FAVOURITE - favourites are unique\"}";
        assert!(body.contains("DUPLICATE_FAVOURITE"));

        let unrelated = "{\"message\": \"AUTHENTICATION_ERROR\"}";
        assert!(!unrelated.contains("DUPLICATE_FAVOURITE"));
    }

    // Vote deletion goes through the listing: there is no
    // delete-by-image endpoint, so the remote id is discovered first.
    #[test]
    fn test_delete_vote_requires_listing_lookup() {
        let listing = vec![("vote-1", "imgA"), ("vote-2", "imgB")];

        let found = listing.iter().find(|(_, image)| *image == "imgB");
        assert_eq!(found.map(|(id, _)| *id), Some("vote-2"));

        let missing = listing.iter().find(|(_, image)| *image == "imgC");
        assert!(missing.is_none());
    }

    // The temporary-id sentinel never collides with remote-assigned ids
    // in practice; entries carrying it are treated as pending.
    #[test]
    fn test_temporary_id_sentinel() {
        const TEMP_ID: i64 = 9_999_999;
        let pending = |id: i64| id == TEMP_ID;
        assert!(pending(9_999_999));
        assert!(!pending(42));
    }
}
