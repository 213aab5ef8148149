table! {
    admin (name) {
        name -> Text,
        password_hash -> Text,
    }
}

table! {
    ad (id) {
        id -> Int4,
        title -> Text,
        description -> Text,
        image_url -> Nullable<Text>,
        link_url -> Text,
        position -> Text,
        category_id -> Nullable<Int4>,
        priority -> Int4,
        is_active -> Bool,
        click_count -> Int4,
        impressions -> Int4,
        created_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
    }
}

table! {
    category (id) {
        id -> Int4,
        slug -> Text,
        name -> Text,
        description -> Text,
        sort_order -> Int4,
    }
}

table! {
    chat_message (id) {
        id -> Int4,
        room_id -> Int4,
        user_ip_hash -> Text,
        user_nickname -> Text,
        message -> Text,
        message_type -> Text,
        is_deleted -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    chat_room (id) {
        id -> Int4,
        title -> Text,
        description -> Text,
        category -> Text,
        max_participants -> Int4,
        is_active -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    comment (id) {
        id -> Int4,
        post_id -> Int4,
        parent_id -> Nullable<Int4>,
        content -> Text,
        author_nickname -> Text,
        author_ip_hash -> Text,
        like_count -> Int4,
        is_deleted -> Bool,
        created_at -> Timestamptz,
    }
}

table! {
    comment_like (id) {
        id -> Int4,
        comment_id -> Int4,
        ip_hash -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    post (id) {
        id -> Int4,
        category_id -> Int4,
        title -> Text,
        content -> Text,
        author_nickname -> Text,
        author_ip_hash -> Text,
        tags -> Array<Text>,
        view_count -> Int4,
        like_count -> Int4,
        comment_count -> Int4,
        is_hot -> Bool,
        is_notice -> Bool,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    post_like (id) {
        id -> Int4,
        post_id -> Int4,
        ip_hash -> Text,
        created_at -> Timestamptz,
    }
}

table! {
    premium_ad (id) {
        id -> Int4,
        title -> Text,
        description -> Text,
        image_url -> Nullable<Text>,
        link_url -> Text,
        position -> Text,
        ad_type -> Text,
        priority -> Int4,
        is_active -> Bool,
        click_count -> Int4,
        impressions -> Int4,
        created_at -> Timestamptz,
        expires_at -> Nullable<Timestamptz>,
    }
}

table! {
    session (id) {
        id -> Text,
        expires -> Timestamptz,
        admin_name -> Text,
    }
}

joinable!(ad -> category (category_id));
joinable!(chat_message -> chat_room (room_id));
joinable!(comment -> post (post_id));
joinable!(comment_like -> comment (comment_id));
joinable!(post -> category (category_id));
joinable!(post_like -> post (post_id));
joinable!(session -> admin (admin_name));

allow_tables_to_appear_in_same_query!(
    admin,
    ad,
    category,
    chat_message,
    chat_room,
    comment,
    comment_like,
    post,
    post_like,
    premium_ad,
    session,
);
