//! Lua scripts for the multi-key queue transitions
//!
//! Each script runs atomically on the server, so two workers polling the
//! same queue never take the same job.

use redis::Script;

pub(crate) struct QueueScripts {
    pub dequeue: Script,
    pub finish: Script,
    pub reschedule: Script,
    pub expire: Script,
    pub settle_expired: Script,
    pub release_unique: Script,
}

impl QueueScripts {
    pub fn new() -> Self {
        Self {
            dequeue: dequeue(),
            finish: finish(),
            reschedule: reschedule(),
            expire: expire(),
            settle_expired: settle_expired(),
            release_unique: release_unique(),
        }
    }
}

/// Moves the oldest due id from the scheduled set to the active set,
/// scored by its lease deadline
///
/// KEYS: scheduled, active, records. ARGV: now in ms, lease deadline in ms.
/// Returns the stored record or nil when nothing is due.
fn dequeue() -> Script {
    Script::new(
        r#"
        local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
        if #ids == 0 then
            return false
        end
        local id = ids[1]
        redis.call('ZREM', KEYS[1], id)
        local record = redis.call('HGET', KEYS[3], id)
        if not record then
            return false
        end
        redis.call('ZADD', KEYS[2], ARGV[2], id)
        return record
        "#,
    )
}

/// Stores a finished record and pushes it onto a bounded history list
///
/// KEYS: active, list, records, scheduled, and optionally the unique key
/// the job holds. ARGV: id, record, retention.
/// The id also leaves the scheduled set in case its lease expired while the
/// worker was still running it. Ids trimmed off the list lose their
/// records. Returns the evicted count.
fn finish() -> Script {
    Script::new(
        r#"
        redis.call('ZREM', KEYS[1], ARGV[1])
        redis.call('ZREM', KEYS[4], ARGV[1])
        if KEYS[5] and redis.call('GET', KEYS[5]) == ARGV[1] then
            redis.call('DEL', KEYS[5])
        end
        redis.call('HSET', KEYS[3], ARGV[1], ARGV[2])
        redis.call('LPUSH', KEYS[2], ARGV[1])
        local keep = tonumber(ARGV[3])
        local evicted = redis.call('LRANGE', KEYS[2], keep, -1)
        redis.call('LTRIM', KEYS[2], 0, keep - 1)
        for _, old in ipairs(evicted) do
            redis.call('HDEL', KEYS[3], old)
        end
        return #evicted
        "#,
    )
}

/// Puts a failed attempt back on the scheduled set
///
/// KEYS: active, scheduled, records. ARGV: id, record, due ms.
fn reschedule() -> Script {
    Script::new(
        r#"
        redis.call('ZREM', KEYS[1], ARGV[1])
        redis.call('HSET', KEYS[3], ARGV[1], ARGV[2])
        redis.call('ZADD', KEYS[2], ARGV[3], ARGV[1])
        return 1
        "#,
    )
}

/// Moves every active id whose lease deadline has passed back onto the
/// scheduled set, due now
///
/// KEYS: active, scheduled. ARGV: now in ms.
/// Returns the moved ids. The ids are never outside both sets, so a crash
/// between this script and [`settle_expired`] cannot lose them.
fn expire() -> Script {
    Script::new(
        r#"
        local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
        for _, id in ipairs(ids) do
            redis.call('ZREM', KEYS[1], id)
            redis.call('ZADD', KEYS[2], ARGV[1], id)
        end
        return ids
        "#,
    )
}

/// Applies the retry decision for an expired job, unless another worker
/// already took it off the scheduled set
///
/// KEYS: scheduled, records, failed list, and optionally the unique key.
/// ARGV: id, record, due ms, dead flag, retention.
/// Returns 1 when the record was written and 0 when the job was taken.
fn settle_expired() -> Script {
    Script::new(
        r#"
        if not redis.call('ZSCORE', KEYS[1], ARGV[1]) then
            return 0
        end
        redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
        if ARGV[4] == '1' then
            redis.call('ZREM', KEYS[1], ARGV[1])
            if KEYS[4] and redis.call('GET', KEYS[4]) == ARGV[1] then
                redis.call('DEL', KEYS[4])
            end
            redis.call('LPUSH', KEYS[3], ARGV[1])
            local keep = tonumber(ARGV[5])
            local evicted = redis.call('LRANGE', KEYS[3], keep, -1)
            redis.call('LTRIM', KEYS[3], 0, keep - 1)
            for _, old in ipairs(evicted) do
                redis.call('HDEL', KEYS[2], old)
            end
        else
            redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
        end
        return 1
        "#,
    )
}

/// Deletes a unique key only while it still names the given job
///
/// KEYS: unique key. ARGV: id.
fn release_unique() -> Script {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        "#,
    )
}
