use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    // 连接尝试，按 provider 统计
    connect_ok: BTreeMap<&'static str, u64>,
    connect_err: BTreeMap<&'static str, u64>,
    // 提交结果：(source, status) → 次数
    submissions: BTreeMap<(&'static str, &'static str), u64>,
    partial_batch_failures: u64,
    // 账本 RPC 成功/失败与时延统计（毫秒）
    ledger_ok: u64,
    ledger_err: u64,
    ledger_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<50, <100, <250, <500, <1000, >=1000
    ledger_hist_buckets: [u64; 6],
    reconciliations: u64,
    reconcile_fallbacks: u64,
}

fn state() -> MutexGuard<'static, MetricsState> {
    match METRICS.get_or_init(|| Mutex::new(MetricsState::default())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn inc_connect(provider: &'static str, ok: bool) {
    let mut s = state();
    let map = if ok {
        &mut s.connect_ok
    } else {
        &mut s.connect_err
    };
    *map.entry(provider).or_insert(0) += 1;
}

pub fn inc_submission(source: &'static str, status: &'static str) {
    *state().submissions.entry((source, status)).or_insert(0) += 1;
}

pub fn inc_partial_batch_failure() {
    state().partial_batch_failures += 1;
}

pub fn observe_ledger_latency_ms(latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        s.ledger_ok += 1;
    } else {
        s.ledger_err += 1;
    }
    s.ledger_latency_sum_ms += latency_ms;
    let b = match latency_ms {
        0..=49 => 0,
        50..=99 => 1,
        100..=249 => 2,
        250..=499 => 3,
        500..=999 => 4,
        _ => 5,
    };
    s.ledger_hist_buckets[b] += 1;
}

pub fn inc_reconciliation(remote_ok: bool) {
    let mut s = state();
    s.reconciliations += 1;
    if !remote_ok {
        s.reconcile_fallbacks += 1;
    }
}

/// 某个 (source, status) 组合的提交次数
pub fn submission_count(source: &str, status: &str) -> u64 {
    state()
        .submissions
        .iter()
        .filter(|((src, st), _)| *src == source && *st == status)
        .map(|(_, v)| *v)
        .sum()
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    out.push_str("# HELP globepayx_wallet_connects_total Wallet connect attempts\n");
    out.push_str("# TYPE globepayx_wallet_connects_total counter\n");
    for (k, v) in s.connect_ok.iter() {
        out.push_str(&format!(
            "globepayx_wallet_connects_total{{provider=\"{}\",result=\"ok\"}} {}\n",
            k, v
        ));
    }
    for (k, v) in s.connect_err.iter() {
        out.push_str(&format!(
            "globepayx_wallet_connects_total{{provider=\"{}\",result=\"err\"}} {}\n",
            k, v
        ));
    }

    out.push_str("# HELP globepayx_submissions_total Transaction outcomes by source and status\n");
    out.push_str("# TYPE globepayx_submissions_total counter\n");
    for ((source, status), v) in s.submissions.iter() {
        out.push_str(&format!(
            "globepayx_submissions_total{{source=\"{}\",status=\"{}\"}} {}\n",
            source, status, v
        ));
    }

    out.push_str("# HELP globepayx_partial_batch_failures_total Batches with some failed recipients\n");
    out.push_str("# TYPE globepayx_partial_batch_failures_total counter\n");
    out.push_str(&format!(
        "globepayx_partial_batch_failures_total {}\n",
        s.partial_batch_failures
    ));

    out.push_str("# HELP globepayx_ledger_requests_total Ledger RPC requests\n");
    out.push_str("# TYPE globepayx_ledger_requests_total counter\n");
    out.push_str(&format!(
        "globepayx_ledger_requests_total{{result=\"ok\"}} {}\n",
        s.ledger_ok
    ));
    out.push_str(&format!(
        "globepayx_ledger_requests_total{{result=\"err\"}} {}\n",
        s.ledger_err
    ));

    out.push_str("# HELP globepayx_ledger_latency_ms_sum Sum of ledger RPC latency in ms\n");
    out.push_str("# TYPE globepayx_ledger_latency_ms_sum counter\n");
    out.push_str(&format!(
        "globepayx_ledger_latency_ms_sum {}\n",
        s.ledger_latency_sum_ms
    ));

    out.push_str("# HELP globepayx_ledger_latency_ms_bucket Ledger RPC latency histogram (ms)\n");
    out.push_str("# TYPE globepayx_ledger_latency_ms_bucket counter\n");
    let labels = ["50", "100", "250", "500", "1000", "+Inf"];
    for (label, count) in labels.iter().zip(s.ledger_hist_buckets.iter()) {
        out.push_str(&format!(
            "globepayx_ledger_latency_ms_bucket{{le=\"{}\"}} {}\n",
            label, count
        ));
    }

    out.push_str("# HELP globepayx_history_reconciliations_total History merges\n");
    out.push_str("# TYPE globepayx_history_reconciliations_total counter\n");
    out.push_str(&format!(
        "globepayx_history_reconciliations_total {}\n",
        s.reconciliations
    ));
    out.push_str(&format!(
        "globepayx_history_reconciliations_total{{remote=\"unavailable\"}} {}\n",
        s.reconcile_fallbacks
    ));

    out
}
