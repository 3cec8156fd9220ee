// Mirrors the `notes` table, which is provisioned outside this crate.

diesel::table! {
    notes (id) {
        id -> Int8,
        name -> Text,
        body -> Text,
        created_at -> Timestamptz,
    }
}
