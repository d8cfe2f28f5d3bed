//! 派单指标
//!
//! 基于 `metrics` crate 的句柄集合，导出端由宿主进程决定。

use metrics::{counter, describe_counter, describe_histogram, histogram, Counter, Histogram};

use ridehail_errors::DispatchResult;

pub struct MetricsCollector {
    offers_delivered_total: Counter,
    offers_skipped_total: Counter,
    offer_timeouts_total: Counter,
    stale_timer_noops_total: Counter,
    rides_accepted_total: Counter,
    rides_cancelled_no_driver_total: Counter,
    rides_cancelled_by_rider_total: Counter,
    dispatch_duration_seconds: Histogram,
}

impl MetricsCollector {
    pub fn new() -> DispatchResult<Self> {
        describe_counter!(
            "dispatch_offers_delivered_total",
            "送达候选司机的报价总数"
        );
        describe_counter!(
            "dispatch_offers_skipped_total",
            "因司机不可达而跳过的报价总数"
        );
        describe_counter!("dispatch_offer_timeouts_total", "报价窗口超时总数");
        describe_counter!(
            "dispatch_stale_timer_noops_total",
            "触发时已过期的定时器总数"
        );
        describe_counter!("dispatch_rides_accepted_total", "接单成功的行程总数");
        describe_counter!(
            "dispatch_rides_cancelled_no_driver_total",
            "因无司机接单而取消的行程总数"
        );
        describe_counter!(
            "dispatch_rides_cancelled_by_rider_total",
            "乘客主动取消的行程总数"
        );
        describe_histogram!(
            "dispatch_duration_seconds",
            "行程从创建到收敛（接单或取消）的耗时"
        );

        Ok(Self {
            offers_delivered_total: counter!("dispatch_offers_delivered_total"),
            offers_skipped_total: counter!("dispatch_offers_skipped_total"),
            offer_timeouts_total: counter!("dispatch_offer_timeouts_total"),
            stale_timer_noops_total: counter!("dispatch_stale_timer_noops_total"),
            rides_accepted_total: counter!("dispatch_rides_accepted_total"),
            rides_cancelled_no_driver_total: counter!("dispatch_rides_cancelled_no_driver_total"),
            rides_cancelled_by_rider_total: counter!("dispatch_rides_cancelled_by_rider_total"),
            dispatch_duration_seconds: histogram!("dispatch_duration_seconds"),
        })
    }

    pub fn record_offer_delivered(&self) {
        self.offers_delivered_total.increment(1);
    }

    pub fn record_offer_skipped(&self) {
        self.offers_skipped_total.increment(1);
    }

    pub fn record_offer_timeout(&self) {
        self.offer_timeouts_total.increment(1);
    }

    pub fn record_stale_timer_noop(&self) {
        self.stale_timer_noops_total.increment(1);
    }

    pub fn record_ride_accepted(&self) {
        self.rides_accepted_total.increment(1);
    }

    pub fn record_ride_cancelled(&self, reason: &str) {
        match reason {
            "rider" => self.rides_cancelled_by_rider_total.increment(1),
            _ => self.rides_cancelled_no_driver_total.increment(1),
        }
    }

    pub fn record_dispatch_duration(&self, seconds: f64) {
        self.dispatch_duration_seconds.record(seconds);
    }
}
