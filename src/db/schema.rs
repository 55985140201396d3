pub const CREATE_POSTGIS: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;
"#;

pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL DEFAULT '',
    profile_pic TEXT,
    password_hash TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_FOLLOWINGS: &str = r#"
CREATE TABLE IF NOT EXISTS followings (
    follower_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    following_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (follower_id, following_id)
);
"#;

pub const CREATE_JOURNEYS: &str = r#"
CREATE TABLE IF NOT EXISTS journeys (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_public BOOLEAN NOT NULL DEFAULT FALSE,
    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    ended_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_CHECKPOINTS: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    id BIGSERIAL PRIMARY KEY,
    journey_id BIGINT NOT NULL REFERENCES journeys(id) ON DELETE CASCADE,
    location geometry(Point, 4326),
    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    note TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_MEDIA: &str = r#"
CREATE TABLE IF NOT EXISTS media (
    id BIGSERIAL PRIMARY KEY,
    checkpoint_id BIGINT NOT NULL REFERENCES checkpoints(id) ON DELETE CASCADE,
    storage_key TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS journeys_user_id_idx ON journeys (user_id, created_at DESC);
"#;

pub const CREATE_PUBLIC_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS journeys_public_idx ON journeys (created_at DESC) WHERE is_public;
"#;

pub const CREATE_CHECKPOINT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS checkpoints_journey_id_idx ON checkpoints (journey_id, timestamp);
"#;

pub const CREATE_MEDIA_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS media_checkpoint_id_idx ON media (checkpoint_id);
"#;

pub const STATEMENTS: &[&str] = &[
    CREATE_POSTGIS,
    CREATE_USERS,
    CREATE_FOLLOWINGS,
    CREATE_JOURNEYS,
    CREATE_CHECKPOINTS,
    CREATE_MEDIA,
    CREATE_INDEXES,
    CREATE_PUBLIC_INDEX,
    CREATE_CHECKPOINT_INDEX,
    CREATE_MEDIA_INDEX,
];
