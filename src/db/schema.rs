diesel::table! {
    users (email) {
        email -> Text,
        username -> Text,
        password -> Text,
        bio -> Nullable<Text>,
        image -> Nullable<Text>,
    }
}

diesel::table! {
    animals (slug) {
        slug -> Text,
        author_email -> Text,
        title -> Text,
        body -> Text,
        image -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tags (name) {
        name -> Text,
    }
}

diesel::table! {
    comments (id) {
        id -> Int4,
        animal_slug -> Text,
        author_email -> Text,
        body -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    animal_tags (animal_slug, tag_name) {
        animal_slug -> Text,
        tag_name -> Text,
    }
}

diesel::table! {
    favorites (user_email, animal_slug) {
        user_email -> Text,
        animal_slug -> Text,
    }
}

// user_email is the followed user, follower_email the follower.
diesel::table! {
    followers (user_email, follower_email) {
        user_email -> Text,
        follower_email -> Text,
    }
}

diesel::joinable!(animals -> users (author_email));
diesel::joinable!(comments -> animals (animal_slug));
diesel::joinable!(comments -> users (author_email));
diesel::joinable!(animal_tags -> animals (animal_slug));
diesel::joinable!(animal_tags -> tags (tag_name));
diesel::joinable!(favorites -> animals (animal_slug));
diesel::joinable!(favorites -> users (user_email));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    animals,
    tags,
    comments,
    animal_tags,
    favorites,
    followers,
);
