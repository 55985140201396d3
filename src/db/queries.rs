pub const PING: &str = "SELECT 1;";

pub const INSERT_JOURNEY: &str = r#"
INSERT INTO journeys (user_id, title, description, is_public, started_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING id, user_id, title, description, is_public, started_at, ended_at, created_at;
"#;

pub const SELECT_JOURNEY: &str = r#"
SELECT id, user_id, title, description, is_public, started_at, ended_at, created_at
FROM journeys WHERE id = $1;
"#;

pub const SELECT_JOURNEY_OWNER: &str = r#"
SELECT user_id FROM journeys WHERE id = $1;
"#;

pub const SELECT_JOURNEYS_BY_OWNER: &str = r#"
SELECT id, user_id, title, description, is_public, started_at, ended_at, created_at
FROM journeys WHERE user_id = $1
ORDER BY created_at DESC, id DESC;
"#;

pub const SELECT_PUBLIC_JOURNEYS: &str = r#"
SELECT id, user_id, title, description, is_public, started_at, ended_at, created_at
FROM journeys WHERE is_public = TRUE
ORDER BY created_at DESC, id DESC
LIMIT $1 OFFSET $2;
"#;

pub const DELETE_JOURNEY: &str = r#"
DELETE FROM journeys WHERE id = $1 AND user_id = $2;
"#;

pub const COMPLETE_JOURNEY: &str = r#"
UPDATE journeys SET ended_at = $3
WHERE id = $1 AND user_id = $2 AND ended_at IS NULL;
"#;

// ST_AsText keeps the codec on its text path regardless of protocol format.
pub const SELECT_CHECKPOINTS_FOR_JOURNEYS: &str = r#"
SELECT id, journey_id, ST_AsText(location) AS location, timestamp, note
FROM checkpoints WHERE journey_id = ANY($1)
ORDER BY timestamp ASC, id ASC;
"#;

pub const INSERT_CHECKPOINT: &str = r#"
INSERT INTO checkpoints (journey_id, location, timestamp, note)
VALUES ($1, $2::geometry, $3, $4)
RETURNING id, journey_id, ST_AsText(location) AS location, timestamp, note;
"#;

pub const SELECT_OWNED_CHECKPOINT_JOURNEY: &str = r#"
SELECT c.journey_id
FROM checkpoints c JOIN journeys j ON j.id = c.journey_id
WHERE c.id = $1 AND j.user_id = $2;
"#;

pub const DELETE_OWNED_CHECKPOINT: &str = r#"
DELETE FROM checkpoints c USING journeys j
WHERE c.id = $1 AND c.journey_id = j.id AND j.user_id = $2;
"#;

pub const SELECT_MEDIA_FOR_CHECKPOINTS: &str = r#"
SELECT id, checkpoint_id, storage_key, kind, created_at
FROM media WHERE checkpoint_id = ANY($1)
ORDER BY id ASC;
"#;

pub const INSERT_MEDIA: &str = r#"
INSERT INTO media (checkpoint_id, storage_key, kind)
VALUES ($1, $2, $3)
RETURNING id, checkpoint_id, storage_key, kind, created_at;
"#;

pub const SELECT_USER: &str = r#"
SELECT id, email, display_name, profile_pic, created_at FROM users WHERE id = $1;
"#;

pub const SELECT_USERS: &str = r#"
SELECT id, email, display_name, profile_pic, created_at FROM users ORDER BY id ASC;
"#;

pub const UPDATE_DISPLAY_NAME: &str = r#"
UPDATE users SET display_name = $2 WHERE id = $1;
"#;

pub const UPDATE_PROFILE_PIC: &str = r#"
UPDATE users SET profile_pic = $2 WHERE id = $1;
"#;

pub const INSERT_FOLLOW: &str = r#"
INSERT INTO followings (follower_id, following_id) VALUES ($1, $2);
"#;

pub const DELETE_FOLLOW: &str = r#"
DELETE FROM followings WHERE follower_id = $1 AND following_id = $2;
"#;

pub const SELECT_FOLLOWERS: &str = r#"
SELECT u.id, u.email, u.display_name, u.profile_pic, u.created_at
FROM users u JOIN followings f ON f.follower_id = u.id
WHERE f.following_id = $1
ORDER BY f.created_at DESC;
"#;

pub const SELECT_FOLLOWING: &str = r#"
SELECT u.id, u.email, u.display_name, u.profile_pic, u.created_at
FROM users u JOIN followings f ON f.following_id = u.id
WHERE f.follower_id = $1
ORDER BY f.created_at DESC;
"#;
