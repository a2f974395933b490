//! Shift accounts: on-duty ticks cost money, and a taxi that has run its
//! account dry goes off duty once it has no fare. With `off_duty_ticks` set
//! it comes back later with a fresh budget.

use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::debug;

use crate::clock::SimulationClock;
use crate::ecs::{Taxi, TaxiDirectory, TaxiLedger, TaxiRoute, TaxiState};
use crate::events::{SimEventKind, TickEvents};
use crate::scenario::SimConfig;

pub fn duty_roster_system(
    clock: Res<SimulationClock>,
    config: Res<SimConfig>,
    directory: Res<TaxiDirectory>,
    mut events: ResMut<TickEvents>,
    mut taxis: Query<(&mut Taxi, &TaxiRoute, &mut TaxiLedger)>,
) {
    let duty = config.duty;
    if !duty.enabled {
        return;
    }
    let now = clock.now();

    for (id, entity) in directory.iter() {
        let Ok((mut taxi, route, mut ledger)) = taxis.get_mut(entity) else {
            continue;
        };

        if taxi.state == TaxiState::OffDuty {
            let Some(rest) = duty.off_duty_ticks else {
                continue;
            };
            let since = ledger.off_duty_since.unwrap_or(now);
            if now.saturating_sub(since) >= rest {
                taxi.state = TaxiState::Idle;
                ledger.account = Some(duty.shift_budget);
                ledger.off_duty_since = None;
                ledger.idle_ticks = 0;
                debug!(tick = now, taxi = %id, "taxi back on duty");
                events.push(now, SimEventKind::TaxiOnDuty { taxi: id });
            }
            continue;
        }

        let balance = ledger.account.unwrap_or(duty.shift_budget) - duty.running_cost_per_tick;
        ledger.account = Some(balance);
        if balance <= 0.0 && taxi.state == TaxiState::Idle && taxi.job.is_none() && route.is_finished() {
            taxi.state = TaxiState::OffDuty;
            ledger.off_duty_since = Some(now);
            debug!(tick = now, taxi = %id, balance, "taxi off duty");
            events.push(now, SimEventKind::TaxiOffDuty { taxi: id });
        }
    }
}
