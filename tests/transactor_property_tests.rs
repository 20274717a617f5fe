use proptest::prelude::*;
use std::future::Future;

use vproc_transactor::pattern::{increment, random};
use vproc_transactor::{
    AddressToken, BurstDescriptor, BurstPattern, Data, DataToken, Decoupler, Dispatcher,
    MemoryBus, Mode, Simulation, Transaction, Transactor, TransactorConfig, Width,
};

/// Run an async property body on a fresh single-threaded runtime
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// Property test generators

/// Generate a bus address with headroom for bursts
fn bus_addr() -> impl Strategy<Value = u32> {
    0u32..0xffff_0000
}

fn width() -> impl Strategy<Value = Width> {
    prop_oneof![Just(Width::W8), Just(Width::W16), Just(Width::W32)]
}

/// Generate a pattern-based burst kind and seed
fn burst_pattern() -> impl Strategy<Value = BurstPattern> {
    prop_oneof![
        any::<u8>().prop_map(BurstPattern::Increment),
        any::<u8>().prop_map(BurstPattern::Random),
    ]
}

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        /// Property: completion order equals enqueue order, whatever order handles are awaited in
        #[test]
        fn prop_completion_order_is_enqueue_order(
            accesses in prop::collection::vec((bus_addr(), width(), any::<u32>(), any::<bool>()), 1..24),
            await_order in Just((0..24usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let seqs = block_on(async {
                let sim = Simulation::spawn(MemoryBus::new());
                let mut dispatcher = Dispatcher::new(0, sim.port());
                let handles: Vec<_> = accesses
                    .iter()
                    .map(|&(addr, width, value, is_write)| {
                        let txn = if is_write {
                            Transaction::write(addr, width, value, Mode::Async)
                        } else {
                            Transaction::read(addr, width, Mode::Async)
                        };
                        dispatcher.enqueue(txn).unwrap()
                    })
                    .collect();

                let mut seqs = vec![0u64; handles.len()];
                for &index in await_order.iter().filter(|&&i| i < handles.len()) {
                    let completion = dispatcher.await_handle(handles[index]).await.unwrap();
                    prop_assert_eq!(completion.txn.id(), handles[index].id());
                    seqs[index] = completion.seq;
                }
                Ok(seqs)
            })?;

            prop_assert!(seqs.windows(2).all(|pair| pair[0] < pair[1]), "seqs: {:?}", seqs);
        }

        /// Property: a blocking issue returns only after everything queued before it completed
        #[test]
        fn prop_blocking_issue_happens_after_earlier_entries(
            earlier in 0usize..16,
            addr in bus_addr()
        ) {
            block_on(async {
                let sim = Simulation::spawn(MemoryBus::new().with_latency(3, 0));
                let mut dispatcher = Dispatcher::new(0, sim.port());
                let handles: Vec<_> = (0..earlier as u32)
                    .map(|i| {
                        dispatcher
                            .enqueue(Transaction::write(addr, Width::W32, i, Mode::Async))
                            .unwrap()
                    })
                    .collect();

                let last = dispatcher
                    .issue_blocking(Transaction::read(addr, Width::W32, Mode::Blocking))
                    .await
                    .unwrap();
                prop_assert_eq!(dispatcher.outstanding(), 0);
                prop_assert_eq!(last.cycle, 3 * (earlier as u64 + 1));

                for handle in handles {
                    let completion = dispatcher.await_handle(handle).await.unwrap();
                    prop_assert!(completion.seq < last.seq);
                }
                Ok(())
            })?;
        }

        /// Property: a pattern burst reads back as P(seed, i) for every index
        #[test]
        fn prop_pattern_burst_round_trip(
            addr in bus_addr(),
            pattern in burst_pattern(),
            len in 1usize..300,
            split in 0usize..300,
        ) {
            let (read_back, mismatches) = block_on(async {
                let sim = Simulation::spawn(MemoryBus::new().fill(0x5a));
                let mut cosim = Transactor::new(TransactorConfig::default(), sim.port());
                let desc = BurstDescriptor::new(addr, len, pattern.clone()).unwrap();
                cosim.burst_write_pattern(desc.clone(), Mode::Async).await.unwrap();

                let split = split.min(len);
                let mut read_back = Vec::new();
                if split > 0 {
                    read_back.extend(cosim.burst_read(addr, split).await.unwrap());
                }
                if split < len {
                    read_back.extend(cosim.burst_read(addr + split as u32, len - split).await.unwrap());
                }
                let mismatches = cosim.burst_read_check(&desc).await.unwrap();
                (read_back, mismatches)
            });

            prop_assert_eq!(mismatches, 0);
            for (i, byte) in read_back.iter().enumerate() {
                prop_assert_eq!(Some(*byte), pattern.byte_at(i));
            }
        }

        /// Property: pattern generators are pure functions of (seed, index)
        #[test]
        fn prop_patterns_are_idempotent(seed in any::<u8>(), index in any::<usize>()) {
            prop_assert_eq!(increment(seed, index), increment(seed, index));
            prop_assert_eq!(random(seed, index), random(seed, index));
            prop_assert_eq!(increment(seed, index), seed.wrapping_add(index as u8));
            prop_assert_eq!(
                BurstPattern::Random(seed).materialize(index % 64 + 1)[index % 64],
                random(seed, index % 64)
            );
        }

        /// Property: four byte lanes in any order compose to the same word
        #[test]
        fn prop_byte_lanes_compose_word(
            bytes in any::<[u8; 4]>(),
            lane_order in Just(vec![0u8, 1, 2, 3]).prop_shuffle(),
            addr in bus_addr(),
            address_first in any::<bool>()
        ) {
            let mut decoupler = Decoupler::new();
            let address = AddressToken::write(addr & !3, Width::W32);
            if address_first {
                decoupler.push_address(address);
            }
            for &lane in &lane_order {
                let token = DataToken::new(u32::from(bytes[usize::from(lane)]), Width::W8, Some(lane)).unwrap();
                decoupler.push_data(token);
            }
            if !address_first {
                decoupler.push_address(address);
            }

            let txn = decoupler.try_pair().unwrap();
            prop_assert_eq!(txn.data(), &Data::Word(u32::from_le_bytes(bytes)));
            prop_assert!(!decoupler.has_unpaired());
        }

        /// Property: async writes closed by a blocking write all read back without mismatches
        #[test]
        fn prop_async_then_blocking_writes_verify(
            addr in bus_addr().prop_map(|a| a & !3),
            wdata in any::<u32>()
        ) {
            let outcome = block_on(async {
                let sim = Simulation::spawn(MemoryBus::new());
                let mut cosim = Transactor::new(TransactorConfig::new(0, "prop"), sim.port());
                for i in 0..3u32 {
                    cosim.write_async(addr + i * 4, wdata.wrapping_add(i)).unwrap();
                }
                cosim.write(addr + 12, wdata.wrapping_add(3)).await.unwrap();

                let expected: Vec<u8> = (0..4u32)
                    .flat_map(|i| wdata.wrapping_add(i).to_le_bytes())
                    .collect();
                let desc = BurstDescriptor::explicit(addr, expected).unwrap();
                let burst_mismatches = cosim.burst_read_check(&desc).await.unwrap();
                for i in 0..4u32 {
                    cosim.read_check(addr + i * 4, wdata.wrapping_add(i)).await.unwrap();
                }
                let outcome = cosim.finish(false).await.unwrap();
                (burst_mismatches, outcome)
            });

            prop_assert_eq!(outcome.0, 0);
            prop_assert!(outcome.1.passed);
            prop_assert_eq!(outcome.1.mismatches, 0);
        }
    }
}
