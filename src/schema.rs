// Diesel table definitions. Keep in sync with src/migrations.

diesel::table! {
    records (id) {
        id -> Text,
        url -> Text,
        provider -> Text,
        title -> Text,
        published_date -> Text,
        description -> Text,
        classification_done -> Bool,
        classification_approved -> Bool,
        media_url -> Nullable<Text>,
        media_path -> Nullable<Text>,
        metadata -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}
