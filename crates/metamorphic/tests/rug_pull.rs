//! End-to-end rug pull through a metamorphic staking contract.
//!
//! A staker deposits into an honest staking contract. The owner kills it and redeploys hostile
//! logic at the same address, which finds the deposit still credited in the token ledger and
//! walks away with it.

use alloy_primitives::{Address, U256};
use metamorphic::{
    contracts::{erc20::IERC20, evil_staking::IEvilStaking, honest_staking::IHonestStaking},
    detect::MetamorphicIndicators,
    test_utils::{account, init_test_tracing, StakingScenario},
    MetamorphicError,
};

const OWNER: Address = StakingScenario::OWNER;

#[test]
fn test_rug_pull_end_to_end() {
    init_test_tracing();
    let mut scenario = StakingScenario::new();
    let announced = scenario.address();
    let stake = U256::from(StakingScenario::INITIAL_BALANCE);

    // Honest deployment at salt 1.
    let honest = scenario.deploy_honest();
    assert_eq!(honest, announced);
    let owner = scenario
        .factory
        .call_typed(OWNER, honest, &IHonestStaking::ownerCall {})
        .unwrap();
    assert_eq!(owner, OWNER);

    // Stake the full balance.
    scenario.approve_and_stake(OWNER, stake);
    assert_eq!(scenario.staking_balance(honest), stake);
    assert_eq!(scenario.staking_balance(OWNER), U256::ZERO);
    let staked = scenario
        .factory
        .call_typed(OWNER, honest, &IHonestStaking::balanceOfCall { account: OWNER })
        .unwrap();
    assert_eq!(staked, stake);

    // Kill: the ledger still credits the address.
    scenario.kill();
    assert!(!scenario.factory.lookup(&scenario.salt).unwrap().is_alive);
    assert!(!scenario.factory.world().has_code(&honest));
    assert_eq!(scenario.staking_balance(honest), stake);

    // Redeploy the evil variant at the very same address.
    let evil = scenario.redeploy_evil();
    assert_eq!(evil, announced);
    let slot = scenario.factory.lookup(&scenario.salt).unwrap();
    assert!(slot.is_alive);
    assert_eq!(slot.incarnation, 2);

    // The new code sees the deposit without anyone depositing into it.
    let visible = scenario
        .factory
        .call_typed(OWNER, evil, &IEvilStaking::checkStakedBalanceCall {})
        .unwrap();
    assert_eq!(visible, stake);

    // And drains it.
    scenario
        .factory
        .call_typed(OWNER, evil, &IEvilStaking::stealTokensCall { destination: OWNER })
        .unwrap();
    let visible = scenario
        .factory
        .call_typed(OWNER, evil, &IEvilStaking::checkStakedBalanceCall {})
        .unwrap();
    assert_eq!(visible, U256::ZERO);
    let balance = scenario
        .factory
        .call_typed(OWNER, scenario.staking_token, &IERC20::balanceOfCall { account: OWNER })
        .unwrap();
    assert_eq!(balance, stake);

    let analysis = scenario.factory.analyze_contract(evil);
    assert!(analysis.is_metamorphic());
    assert!(analysis.indicators.contains(
        MetamorphicIndicators::CODE_HASH_CHANGED | MetamorphicIndicators::METAMORPHIC_INIT_CODE
    ));
}

#[test]
fn test_evil_variant_cannot_read_stake_records() {
    let mut scenario = StakingScenario::new();
    let honest = scenario.deploy_honest();
    scenario.approve_and_stake(OWNER, U256::from(1_000));
    scenario.kill();
    let evil = scenario.redeploy_evil();
    assert_eq!(honest, evil);

    // The honest interface is gone even though the address is the same.
    let err = scenario
        .factory
        .call_typed(OWNER, evil, &IHonestStaking::balanceOfCall { account: OWNER })
        .unwrap_err();
    assert!(matches!(err, MetamorphicError::UnknownSelector(_)));
}

#[test]
fn test_only_the_owner_can_steal() {
    let mut scenario = StakingScenario::new();
    scenario.deploy_honest();
    scenario.approve_and_stake(OWNER, U256::from(500));
    scenario.kill();
    let evil = scenario.redeploy_evil();

    let thief = account(0xbad);
    let err = scenario
        .factory
        .call_typed(thief, evil, &IEvilStaking::stealTokensCall { destination: thief })
        .err()
        .unwrap();
    assert!(matches!(err, MetamorphicError::Unauthorized { caller } if caller == thief));
    assert_eq!(scenario.staking_balance(evil), U256::from(500));
}
